use anyhow::Result;
use contracts::usecases::u501_import_clientes::RawSheet;

/// Разбор CSV-файла в лист: первая запись - заголовки.
///
/// Разделитель определяется по первой строке (`;` в выгрузках с
/// испанской локалью, иначе `,`). Битые записи пропускаются с предупреждением.
pub fn read_csv(file_name: &str, data: &[u8]) -> Result<RawSheet> {
    let text = std::str::from_utf8(data)
        .map_err(|e| anyhow::anyhow!("CSV file is not valid UTF-8: {}", e))?;

    // Strip UTF-8 BOM if present
    let text = text.trim_start_matches('\u{FEFF}');
    if text.trim().is_empty() {
        anyhow::bail!("CSV file is empty");
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(detect_delimiter(text))
        .from_reader(text.as_bytes());

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut skipped = 0usize;
    let mut lines = LineCursor::new(text);
    let mut header_line: Option<u64> = None;
    // переносы строк внутри кавычек не образуют новых строк листа
    let mut continuation_lines = 0u64;
    let mut record = csv::StringRecord::new();
    loop {
        let record_from = reader.position().byte() as usize;
        match reader.read_record(&mut record) {
            Ok(false) => break,
            Ok(true) => {
                let line = lines.record_start(record_from);
                // Пустые и битые строки остаются пустыми строками листа,
                // чтобы _rowIndex совпадал с номером строки в файле
                let slot = match header_line {
                    Some(header) => (line - header - continuation_lines) as usize,
                    None => {
                        header_line = Some(line);
                        0
                    }
                };
                while rows.len() < slot {
                    rows.push(Vec::new());
                }
                continuation_lines += record.iter().map(|f| f.matches('\n').count() as u64).sum::<u64>();
                rows.push(record.iter().map(str::to_string).collect());
            }
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or_default();
                tracing::warn!("Skipping malformed CSV record near line {} in '{}': {}", line, file_name, e);
                skipped += 1;
                if reader.position().byte() as usize == record_from {
                    break;
                }
            }
        }
    }

    tracing::info!(
        "CSV '{}' read: {} records, {} skipped",
        file_name,
        rows.len(),
        skipped
    );
    Ok(RawSheet::from_text(file_name, rows))
}

/// Номер физической строки по байтовому смещению (только вперёд)
struct LineCursor<'a> {
    text: &'a str,
    offset: usize,
    line: u64,
}

impl<'a> LineCursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, offset: 0, line: 1 }
    }

    /// Line of the first byte of a record read from `from`.
    /// The csv reader skips blank lines before a record, so they are skipped here too.
    fn record_start(&mut self, from: usize) -> u64 {
        let rest = self.text.get(from..).unwrap_or_default();
        let start = from + (rest.len() - rest.trim_start_matches(['\r', '\n']).len());
        if start > self.offset {
            let advanced = self.text.get(self.offset..start).unwrap_or_default();
            self.line += advanced.matches('\n').count() as u64;
            self.offset = start;
        }
        self.line
    }
}

fn detect_delimiter(text: &str) -> u8 {
    let first_line = text.lines().next().unwrap_or_default();
    let semicolons = first_line.matches(';').count();
    let commas = first_line.matches(',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}
