use crate::cli::args::{CliArgs, Command, CustomerCommand, CustomerFields, FilmCommand};
use crate::output::OutputFormat;

fn validate_new_customer(fields: &CustomerFields) -> Result<(), String> {
    if fields.from_file.is_some() {
        if fields.has_field_flags() {
            return Err("--from-file cannot be combined with field flags".to_string());
        }
        return Ok(());
    }
    for (flag, value) in [
        ("--first-name", &fields.first_name),
        ("--last-name", &fields.last_name),
        ("--email", &fields.email),
    ] {
        if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
            return Err(format!("{flag} is required (or use --from-file)"));
        }
    }
    Ok(())
}

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err("invalid timeout, expected positive integer".to_string());
        }
    }
    if let Some(page_size) = args.page_size {
        if page_size == 0 {
            return Err("invalid page-size, expected positive integer".to_string());
        }
    }
    if let Some(raw) = args.output_format.as_deref() {
        if OutputFormat::parse(raw).is_none() {
            return Err(format!(
                "invalid --output-format '{raw}', expected text or json"
            ));
        }
    }
    if let Some(raw) = args.base_url.as_deref() {
        crate::client::normalize_base_url(raw).map_err(|e| format!("invalid --base-url: {e}"))?;
    }

    match &args.command {
        Command::Customers(CustomerCommand::Add(fields)) => validate_new_customer(fields)?,
        Command::Customers(CustomerCommand::Edit { fields, .. }) => {
            if fields.from_file.is_some() && fields.has_field_flags() {
                return Err("--from-file cannot be combined with field flags".to_string());
            }
            if fields.from_file.is_none() && !fields.has_field_flags() {
                return Err("nothing to change, pass field flags or --from-file".to_string());
            }
        }
        Command::Films(FilmCommand::Rent {
            staff_id: Some(staff_id),
            ..
        }) if *staff_id <= 0 => {
            return Err("invalid staff-id, expected positive integer".to_string());
        }
        _ => {}
    }
    Ok(())
}
