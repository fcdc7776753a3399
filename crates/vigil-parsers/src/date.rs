use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

/// Parse a report timestamp into a date.
///
/// Scanners emit all kinds of timestamps; this accepts RFC 3339, the common
/// `YYYY-MM-DD HH:MM:SS` form (with optional trailing zone text, which is
/// ignored) and plain `YYYY-MM-DD` dates. `None` means unparseable, in which
/// case the import falls back to the scan date.
pub(crate) fn parse_report_date(raw: &str) -> Option<Date> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(odt) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(odt.date());
    }
    let datetime = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let head = raw.get(..19).unwrap_or(raw);
    if let Ok(pdt) = PrimitiveDateTime::parse(head, &datetime) {
        return Some(pdt.date());
    }
    let date_only = format_description!("[year]-[month]-[day]");
    let head = raw.get(..10).unwrap_or(raw);
    if let Ok(date) = Date::parse(head, &date_only) {
        return Some(date);
    }
    None
}
