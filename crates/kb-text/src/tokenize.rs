use std::sync::{Arc, OnceLock};

use jieba_rs::Jieba;
use kb_core::language::is_cjk_ideograph;
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, TextAnalyzer, TokenStream};

/// Splits text into index terms.
///
/// Runs of CJK ideographs are word-segmented with jieba; everything else goes
/// through a tantivy analyzer that splits on non-alphanumerics and lowercases.
/// Documents and queries must go through the same instance configuration.
pub struct Tokenizer {
    analyzer: TextAnalyzer,
    jieba: Jieba,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self { analyzer: build_analyzer(), jieba: Jieba::new() }
    }

    /// Process-wide instance; loading the jieba dictionary is not free.
    pub fn shared() -> Arc<Tokenizer> {
        static SHARED: OnceLock<Arc<Tokenizer>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(Tokenizer::new())).clone()
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut analyzer = self.analyzer.clone();
        for (cjk, run) in script_runs(text) {
            if cjk {
                tokens.extend(
                    self.jieba
                        .cut(run, true)
                        .into_iter()
                        .filter(|t| t.chars().any(char::is_alphanumeric))
                        .map(str::to_string),
                );
            } else {
                let mut stream = analyzer.token_stream(run);
                while stream.advance() {
                    tokens.push(stream.token().text.clone());
                }
            }
        }
        tokens
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

pub fn build_analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(LowerCaser)
        .build()
}

/// Split `text` into maximal runs that are either all CJK ideographs or contain none.
fn script_runs(text: &str) -> Vec<(bool, &str)> {
    let mut runs = Vec::new();
    let mut start = 0usize;
    let mut current: Option<bool> = None;
    for (i, c) in text.char_indices() {
        let cjk = is_cjk_ideograph(c);
        match current {
            Some(prev) if prev != cjk => {
                runs.push((prev, &text[start..i]));
                start = i;
                current = Some(cjk);
            }
            None => current = Some(cjk),
            _ => {}
        }
    }
    if let Some(prev) = current {
        runs.push((prev, &text[start..]));
    }
    runs
}
