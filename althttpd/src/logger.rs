//! The CSV access logger (§4.3): one line per request, written with the
//! `csv` crate so quoting (each embedded `"` doubled) is delegated to a
//! real CSV writer instead of hand-rolled doubling, and the log path's
//! `chrono`-style calendar tokens are expanded fresh on every call, since
//! the file is opened, appended, and closed once per request (no cached
//! file handle to invalidate at midnight).

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Local;

use crate::context::{ConnectionState, ProcessUsage, RequestContext};

/// Expands `template`'s `chrono` calendar tokens (e.g. `%Y`, `%m`, `%d`)
/// against the current local time; falls back to the literal template if
/// expansion produces an empty string (§4.3: "if the expansion is
/// non-empty ... the expanded name is used, else the literal").
#[must_use]
pub fn expand_log_path(template: &Path) -> PathBuf {
    let raw = template.to_string_lossy();
    let expanded = Local::now().format(&raw).to_string();
    if expanded.is_empty() {
        template.to_path_buf()
    } else {
        PathBuf::from(expanded)
    }
}

fn quote_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Appends one CSV line to `log_path` (opened append-only, closed before
/// return) for the request just completed on `ctx`, then reports the
/// freshly sampled [`ProcessUsage`] so the caller can store it on
/// [`ConnectionState`] for the *next* call's delta.
pub fn append_entry(
    log_path: &Path,
    ctx: &RequestContext,
    connection: &ConnectionState,
    request_start: Instant,
) -> std::io::Result<ProcessUsage> {
    let now = ProcessUsage::sample();
    let [self_user, self_system, children_user, children_system] = now.delta_since(&connection.previous_usage);
    let wall_usec = request_start.elapsed().as_micros().min(u128::from(u64::MAX)) as u64;

    let scheme = if ctx.https { "https" } else { "http" };
    let full_url = format!("{scheme}://{} {}{}", ctx.host, ctx.script_uri, ctx.query_suffix);

    let file = std::fs::OpenOptions::new().create(true).append(true).open(log_path)?;
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);

    writer.write_record([
        Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        ctx.remote_addr.clone(),
        quote_field(&full_url),
        quote_field(ctx.referer.as_deref().unwrap_or("")),
        format!("{:03}", ctx.reply_status),
        ctx.bytes_in.to_string(),
        ctx.bytes_out.to_string(),
        self_user.to_string(),
        self_system.to_string(),
        children_user.to_string(),
        children_system.to_string(),
        wall_usec.to_string(),
        connection.request_number.to_string(),
        quote_field(ctx.user_agent.as_deref().unwrap_or("")),
        quote_field(ctx.remote_user.as_deref().unwrap_or("")),
        (scheme.len() + ctx.host.len() + ctx.script_uri.len() + 3).to_string(),
        ctx.diagnostic_code.to_string(),
    ])?;
    writer.flush()?;

    // The logger is the sole owner of a POST body's temporary file: it
    // unlinks it on every call, whether or not the body was ever read
    // (§4.3), rather than leaving cleanup to the dispatcher that created it.
    if let Some(post_body_path) = &ctx.post_body_path {
        let _ = std::fs::remove_file(post_body_path);
    }

    Ok(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::NamedTempFile;

    #[test]
    fn template_without_calendar_tokens_passes_through() {
        let path = Path::new("/var/log/althttpd.log");
        assert_eq!(expand_log_path(path), PathBuf::from("/var/log/althttpd.log"));
    }

    #[test]
    fn calendar_token_expands_to_a_nonempty_name() {
        let path = Path::new("/var/log/althttpd-%Y.log");
        let expanded = expand_log_path(path);
        assert!(expanded.to_string_lossy().len() > path.to_string_lossy().len() - 2);
        assert!(!expanded.to_string_lossy().contains('%'));
    }

    #[test]
    fn quote_field_doubles_embedded_quotes() {
        assert_eq!(quote_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn append_entry_writes_one_csv_line_with_seventeen_fields() {
        let file = NamedTempFile::new().unwrap();
        let mut ctx = RequestContext::new("10.0.0.1".to_string(), false, false);
        ctx.host = "example.com".to_string();
        ctx.script_uri = "/index.html".to_string();
        ctx.reply_status = 200;
        let connection = ConnectionState::new(false);

        append_entry(file.path(), &ctx, &connection, Instant::now()).unwrap();

        let mut contents = String::new();
        std::fs::File::open(file.path()).unwrap().read_to_string(&mut contents).unwrap();
        let mut reader = csv::ReaderBuilder::new().has_headers(false).from_reader(contents.as_bytes());
        let record = reader.records().next().unwrap().unwrap();
        assert_eq!(record.len(), 17);
        assert_eq!(&record[4], "200");
        // "http" (4) + "example.com" (11) + "/index.html" (11) + 3 == 29.
        assert_eq!(&record[15], "29");
    }

    #[test]
    fn post_body_temp_file_is_unlinked_on_every_call() {
        let log_file = NamedTempFile::new().unwrap();
        let body_path = {
            let body_file = NamedTempFile::new().unwrap();
            let (_, path) = body_file.keep().unwrap();
            path
        };
        assert!(body_path.exists());

        let mut ctx = RequestContext::new("10.0.0.1".to_string(), false, false);
        ctx.post_body_path = Some(body_path.clone());
        let connection = ConnectionState::new(false);

        append_entry(log_file.path(), &ctx, &connection, Instant::now()).unwrap();
        assert!(!body_path.exists());
    }
}
