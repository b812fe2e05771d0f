pub mod link_analyzer;
pub mod linguistic;
pub mod structural;

pub use link_analyzer::LinkAnalyzer;
pub use linguistic::{LinguisticAnalyzer, Tokenizer, WordTokenizer};
pub use structural::analyze_structure;
