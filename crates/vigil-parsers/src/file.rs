use crate::error::ParserResult;

/// One uploaded scan report.
///
/// The filename is optional. Parsers that accept several formats prefer the
/// file extension when a name is present and fall back to sniffing the
/// content otherwise.
#[derive(Debug, Clone)]
pub struct ReportFile {
    pub name: Option<String>,
    pub data: Vec<u8>,
}

/// Coarse report format, for parsers that dispatch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Xml,
    Csv,
}

impl ReportFile {
    /// Report with a known filename.
    pub fn named(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: Some(name.into()),
            data: data.into(),
        }
    }

    /// Report without a filename, e.g. inline API payloads.
    pub fn unnamed(data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: None,
            data: data.into(),
        }
    }

    /// Lowercased file extension, when a name is present and has one.
    pub fn extension(&self) -> Option<String> {
        let name = self.name.as_deref()?;
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// Resolve the report format.
    ///
    /// The file extension wins when it names a known format; otherwise the
    /// first non-whitespace byte decides: `{` or `[` means JSON, `<` means
    /// XML, anything else is treated as CSV.
    pub fn format(&self) -> ReportFormat {
        match self.extension().as_deref() {
            Some("json") => return ReportFormat::Json,
            Some("xml") => return ReportFormat::Xml,
            Some("csv") => return ReportFormat::Csv,
            _ => {}
        }
        match self.data.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{') | Some(b'[') => ReportFormat::Json,
            Some(b'<') => ReportFormat::Xml,
            _ => ReportFormat::Csv,
        }
    }

    /// The report content as UTF-8 text.
    pub fn text(&self) -> ParserResult<&str> {
        Ok(std::str::from_utf8(&self.data)?)
    }
}
