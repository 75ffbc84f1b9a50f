use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use iat_core::{ParticipantId, TrialResult};
use tracing::info;

pub const DELIMITER: &str = ";";

pub const HEADER: [&str; 8] = [
    "Numero_telefono",
    "Immagine",
    "Tipo_immagine",
    "Risposta_data",
    "RispostaCorretta",
    "Correttezza",
    "RT_ms",
    "Blocco",
];

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to write results to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Destination of the results file.
pub trait ResultSink {
    fn save(&mut self, file_name: &str, contents: &str) -> Result<PathBuf, ExportError>;
}

/// Writes result files into a directory, creating it if needed.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ResultSink for FileSink {
    fn save(&mut self, file_name: &str, contents: &str) -> Result<PathBuf, ExportError> {
        let path = self.dir.join(file_name);
        fs::create_dir_all(&self.dir)
            .and_then(|()| fs::write(&path, contents))
            .map_err(|source| ExportError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }
}

/// Keeps saved files in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub files: Vec<(String, String)>,
}

impl ResultSink for MemorySink {
    fn save(&mut self, file_name: &str, contents: &str) -> Result<PathBuf, ExportError> {
        self.files.push((file_name.to_string(), contents.to_string()));
        Ok(PathBuf::from(file_name))
    }
}

pub fn file_name(participant: &ParticipantId) -> String {
    format!("IAT_risultati_{participant}.csv")
}

/// Quotes `field` when it contains the delimiter, a quote or a line break,
/// doubling inner quotes. Other fields are written as they are.
fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains(DELIMITER) || field.contains(['"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Header plus one row per result, in order, each line `\n`-terminated.
pub fn to_delimited(results: &[TrialResult]) -> String {
    let mut out = HEADER.join(DELIMITER);
    out.push('\n');
    for r in results {
        let row = [
            r.participant_id.clone(),
            r.image.clone(),
            r.category.clone(),
            r.response.clone(),
            r.correct_response.clone(),
            r.correctness().to_string(),
            r.reaction_time_ms.to_string(),
            r.block.to_string(),
        ];
        let row: Vec<Cow<'_, str>> = row.iter().map(|f| escape_field(f)).collect();
        out.push_str(&row.join(DELIMITER));
        out.push('\n');
    }
    out
}

/// Saves `results` for `participant`. Nothing is written for an empty log.
pub fn export<K: ResultSink + ?Sized>(
    sink: &mut K,
    participant: &ParticipantId,
    results: &[TrialResult],
) -> Result<Option<PathBuf>, ExportError> {
    if results.is_empty() {
        return Ok(None);
    }
    let path = sink.save(&file_name(participant), &to_delimited(results))?;
    info!(path = %path.display(), rows = results.len(), "results saved");
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(image: &str, correct: bool, rt: u64) -> TrialResult {
        TrialResult {
            participant_id: "123".into(),
            image: image.into(),
            category: "Conflitto".into(),
            response: "A".into(),
            correct_response: if correct { "A" } else { "L" }.into(),
            correct,
            reaction_time_ms: rt,
            block: 3,
        }
    }

    fn participant() -> ParticipantId {
        "123".parse().unwrap()
    }

    #[test]
    fn serializes_header_and_rows_in_order() {
        let text = to_delimited(&[result("a.jpg", true, 420), result("b.jpg", false, 615)]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "Numero_telefono;Immagine;Tipo_immagine;Risposta_data;RispostaCorretta;Correttezza;RT_ms;Blocco"
        );
        assert_eq!(lines[1], "123;a.jpg;Conflitto;A;A;1;420;3");
        assert_eq!(lines[2], "123;b.jpg;Conflitto;A;L;0;615;3");
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn delimiter_inside_a_field_keeps_columns_aligned() {
        let mut r = result("a.jpg", true, 420);
        r.category = "Neutre; calme".into();
        r.image = "say \"hi\".jpg".into();
        let text = to_delimited(&[r]);
        let row = text.lines().nth(1).unwrap();
        assert_eq!(row, "123;\"say \"\"hi\"\".jpg\";\"Neutre; calme\";A;A;1;420;3");
    }

    #[test]
    fn empty_log_writes_nothing() {
        let mut sink = MemorySink::default();
        assert_eq!(export(&mut sink, &participant(), &[]).unwrap(), None);
        assert!(sink.files.is_empty());
    }

    #[test]
    fn file_sink_names_file_after_participant() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path().join("out"));
        let path = export(&mut sink, &participant(), &[result("a.jpg", true, 1)])
            .unwrap()
            .unwrap();
        assert_eq!(path.file_name().unwrap(), "IAT_risultati_123.csv");
        let written = fs::read_to_string(path).unwrap();
        assert_eq!(written.lines().count(), 2);
    }

    #[test]
    fn file_sink_reports_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("taken");
        fs::write(&blocker, "").unwrap();
        let mut sink = FileSink::new(&blocker);
        let err = export(&mut sink, &participant(), &[result("a.jpg", true, 1)]).unwrap_err();
        assert!(matches!(err, ExportError::Io { .. }));
    }
}
