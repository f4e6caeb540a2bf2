//! Image executors: `ocr-read` and `redact-image`, both backed by tesseract.

use std::{path::Path, sync::Arc};

use serde_json::json;
use tracing::{debug, info};

use ghosthand_contracts::{
    action::{ActionKind, Parameters},
    error::{GhosthandError, GhosthandResult},
    execution::StepResult,
};
use ghosthand_core::traits::ActionExecutor;

use crate::{
    command::{run_checked, CommandRunner},
    files::FileLocator,
    params,
};

/// `ocr-read`: extract the text of an image.
pub struct OcrReadExecutor {
    runner: Arc<dyn CommandRunner>,
    locator: FileLocator,
    tesseract: String,
}

impl OcrReadExecutor {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        locator: FileLocator,
        tesseract: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            locator,
            tesseract: tesseract.into(),
        }
    }
}

impl ActionExecutor for OcrReadExecutor {
    fn execute(&self, parameters: &Parameters) -> GhosthandResult<StepResult> {
        let kind = ActionKind::OcrRead.as_str();
        let target = params::required_str(kind, parameters, "image_path")?;
        let image = self.locator.resolve(kind, target, true)?;

        let output = run_checked(
            self.runner.as_ref(),
            kind,
            &self.tesseract,
            vec![image.display().to_string(), "stdout".to_string()],
        )?;
        let text = output.stdout.trim().to_string();

        info!(image = %image.display(), chars = text.len(), "image text extracted");
        Ok(StepResult::success_with(
            format!("read {} characters from {}", text.chars().count(), image.display()),
            json!({ "path": image.display().to_string(), "text": text }),
        ))
    }
}

/// One word box from tesseract's TSV output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordBox {
    pub word_num: u32,
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
    pub text: String,
}

/// Parse the word-level rows (level 5) of `tesseract … tsv` output.
pub fn parse_tsv(tsv: &str) -> Vec<WordBox> {
    tsv.lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split('\t').collect();
            if cols.len() < 12 || cols[0] != "5" {
                return None;
            }
            let text = cols[11].trim();
            if text.is_empty() {
                return None;
            }
            Some(WordBox {
                word_num: cols[5].parse().ok()?,
                left: cols[6].parse().ok()?,
                top: cols[7].parse().ok()?,
                width: cols[8].parse().ok()?,
                height: cols[9].parse().ok()?,
                text: text.to_string(),
            })
        })
        .collect()
}

fn bare(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase()
}

/// Capitalized, alphabetic, not the first word of its line.
fn looks_like_name(word: &WordBox) -> bool {
    let text = word.text.trim_matches(|c: char| !c.is_alphanumeric());
    let mut chars = text.chars();
    word.word_num > 1
        && chars.next().is_some_and(char::is_uppercase)
        && text.chars().count() > 1
        && text.chars().all(char::is_alphabetic)
        && chars.any(char::is_lowercase)
}

/// Boxes to black out: words matching `terms`, or likely names if none given.
pub fn select_boxes<'w>(words: &'w [WordBox], terms: &[String]) -> Vec<&'w WordBox> {
    if terms.is_empty() {
        return words.iter().filter(|w| looks_like_name(w)).collect();
    }
    let wanted: Vec<String> = terms
        .iter()
        .flat_map(|t| t.split_whitespace().map(bare).collect::<Vec<_>>())
        .filter(|t| !t.is_empty())
        .collect();
    words
        .iter()
        .filter(|w| wanted.contains(&bare(&w.text)))
        .collect()
}

/// `redact-image`: black out names (or given terms) and save a copy.
pub struct RedactImageExecutor {
    runner: Arc<dyn CommandRunner>,
    locator: FileLocator,
    tesseract: String,
    convert: String,
}

impl RedactImageExecutor {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        locator: FileLocator,
        tesseract: impl Into<String>,
        convert: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            locator,
            tesseract: tesseract.into(),
            convert: convert.into(),
        }
    }
}

fn redacted_path(image: &Path) -> GhosthandResult<std::path::PathBuf> {
    let name = image
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            let kind = ActionKind::RedactImage.as_str();
            GhosthandError::executor(kind, "image path has no file name")
        })?;
    Ok(image.with_file_name(format!("redacted_{}", name)))
}

impl ActionExecutor for RedactImageExecutor {
    fn execute(&self, parameters: &Parameters) -> GhosthandResult<StepResult> {
        let kind = ActionKind::RedactImage.as_str();
        let target = params::required_str(kind, parameters, "target")?;
        let terms = params::optional_str_list(parameters, "terms");
        let image = self.locator.resolve(kind, target, true)?;

        let tsv = run_checked(
            self.runner.as_ref(),
            kind,
            &self.tesseract,
            vec![image.display().to_string(), "stdout".to_string(), "tsv".to_string()],
        )?;
        let words = parse_tsv(&tsv.stdout);
        let boxes = select_boxes(&words, &terms);
        debug!(words = words.len(), boxes = boxes.len(), "redaction boxes selected");

        if boxes.is_empty() {
            return Ok(StepResult::success_with(
                "nothing to redact",
                json!({ "path": image.display().to_string(), "redacted": 0 }),
            ));
        }

        let output = redacted_path(&image)?;
        let mut args = vec![image.display().to_string(), "-fill".to_string(), "black".to_string()];
        for b in &boxes {
            args.push("-draw".to_string());
            args.push(format!(
                "rectangle {},{} {},{}",
                b.left.saturating_sub(2),
                b.top.saturating_sub(2),
                b.left + b.width + 2,
                b.top + b.height + 2
            ));
        }
        args.push(output.display().to_string());
        run_checked(self.runner.as_ref(), kind, &self.convert, args)?;

        info!(
            image = %image.display(),
            output = %output.display(),
            redacted = boxes.len(),
            "image redacted"
        );
        Ok(StepResult::success_with(
            format!("redacted {} words into {}", boxes.len(), output.display()),
            json!({ "path": output.display().to_string(), "redacted": boxes.len() }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use crate::command::mock::RecordingRunner;

    use super::*;

    const TSV: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\t\
        left\ttop\twidth\theight\tconf\ttext\n\
        1\t1\t0\t0\t0\t0\t0\t0\t800\t600\t-1\t\n\
        5\t1\t1\t1\t1\t1\t10\t20\t40\t12\t96\tMeeting\n\
        5\t1\t1\t1\t1\t2\t60\t20\t30\t12\t95\twith\n\
        5\t1\t1\t1\t1\t3\t100\t20\t35\t12\t94\tAlice\n\
        5\t1\t1\t1\t1\t4\t140\t20\t50\t12\t93\tSmith,\n\
        5\t1\t1\t1\t1\t5\t200\t20\t30\t12\t92\tABC\n";

    fn params(value: serde_json::Value) -> Parameters {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn tsv_words_are_parsed() {
        let words = parse_tsv(TSV);
        assert_eq!(words.len(), 5);
        assert_eq!(words[2].text, "Alice");
        assert_eq!((words[2].left, words[2].top), (100, 20));
    }

    #[test]
    fn name_heuristic_skips_line_starts_and_acronyms() {
        let words = parse_tsv(TSV);
        let picked: Vec<&str> = select_boxes(&words, &[]).iter().map(|w| w.text.as_str()).collect();
        assert_eq!(picked, vec!["Alice", "Smith,"]);
    }

    #[test]
    fn explicit_terms_match_case_insensitively() {
        let words = parse_tsv(TSV);
        let picked: Vec<&str> = select_boxes(&words, &["meeting".to_string()])
            .iter()
            .map(|w| w.text.as_str())
            .collect();
        assert_eq!(picked, vec!["Meeting"]);
    }

    #[test]
    fn redaction_draws_one_rectangle_per_box() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("shot.png");
        File::create(&image).unwrap();
        let runner = Arc::new(RecordingRunner::replying(0, TSV));
        let executor = RedactImageExecutor::new(
            runner.clone(),
            FileLocator::default(),
            "tesseract",
            "convert",
        );

        let result = executor
            .execute(&params(json!({ "target": image.display().to_string() })))
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "tesseract");
        assert_eq!(calls[1].0, "convert");
        assert_eq!(calls[1].1.iter().filter(|a| *a == "-draw").count(), 2);
        assert!(calls[1].1.last().unwrap().ends_with("redacted_shot.png"));
        assert_eq!(result.produced_value.unwrap()["redacted"], json!(2));
    }

    #[test]
    fn ocr_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("shot.png");
        File::create(&image).unwrap();
        let runner = Arc::new(RecordingRunner::replying(1, ""));
        let executor = OcrReadExecutor::new(runner, FileLocator::default(), "tesseract");

        let err = executor
            .execute(&params(json!({ "image_path": image.display().to_string() })))
            .unwrap_err();
        assert!(err.to_string().contains("exited with status 1"));
    }

    #[test]
    fn ocr_returns_text() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("shot.png");
        File::create(&image).unwrap();
        let runner = Arc::new(RecordingRunner::replying(0, "Hello world\n"));
        let executor = OcrReadExecutor::new(runner, FileLocator::default(), "tesseract");

        let result = executor
            .execute(&params(json!({ "image_path": image.display().to_string() })))
            .unwrap();
        assert_eq!(result.produced_value.unwrap()["text"], json!("Hello world"));
    }
}
