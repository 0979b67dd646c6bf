use std::collections::HashMap;
use anyhow::{bail, Result};

/// Stores one option into `options`, returning the index of the next argument.
///
/// `flags` lists the option names that take no value; they are stored as
/// `"true"`.
fn process_option(
    prefix: &str,
    args: &[String],
    i: usize,
    flags: &[&str],
    options: &mut HashMap<String, String>,
) -> Result<usize> {
    let arg = &args[i];
    let body = arg.trim_start_matches(prefix);

    if let Some((key, value)) = body.split_once('=') {
        if key.is_empty() {
            bail!("Invalid option: {}", arg);
        }
        options.insert(key.to_string(), value.to_string());
        return Ok(i + 1);
    }

    if body.is_empty() {
        bail!("Invalid option: {}", arg);
    }

    if flags.contains(&body) {
        options.insert(body.to_string(), "true".to_string());
        return Ok(i + 1);
    }

    if i + 1 < args.len() && !args[i + 1].starts_with('-') {
        // Next argument is the value
        options.insert(body.to_string(), args[i + 1].clone());
        Ok(i + 2)
    } else {
        bail!("Option {} requires a value", arg);
    }
}

/// Collect `-k v`, `--key v`, `--key=v` and bare `--flag` options.
pub fn parse_args(args: &[String], flags: &[&str]) -> Result<HashMap<String, String>> {
    let mut options = HashMap::new();
    let mut i = 0;

    while i < args.len() {
        let arg = &args[i];

        // "--" signals end of options
        if arg == "--" {
            break;
        }

        if arg.starts_with("--") {
            i = process_option("--", args, i, flags, &mut options)?;
        } else if arg.starts_with('-') && arg.len() > 1 {
            i = process_option("-", args, i, flags, &mut options)?;
        } else {
            // Positional arguments, including a lone "-", are skipped
            i += 1;
        }
    }

    Ok(options)
}
