//! Per-(term, doc) scoring functions. Both return NaN on inputs that make
//! the score undefined; the evaluator treats NaN as "no score" and skips it.

const BM25_K: f64 = 1.2;
const BM25_B: f64 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingAlgo {
    TfIdf,
    Bm25,
}

impl RankingAlgo {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "TF-IDF" | "TFIDF" => Some(Self::TfIdf),
            "BM25" => Some(Self::Bm25),
            _ => None,
        }
    }
}

/// `tf = log(term_count_in_doc + 1)`, `idf = log(N / doc_freq) + 1`.
pub fn tf_idf(term_count_in_doc: u32, doc_freq: u64, doc_count: u64) -> f64 {
    if term_count_in_doc == 0 {
        return f64::NAN;
    }
    let tf = ((term_count_in_doc + 1) as f64).ln();
    let idf = (doc_count as f64 / doc_freq as f64).ln() + 1.0;
    tf * idf
}

/// BM25 with k=1.2, b=0.75.
#[allow(clippy::too_many_arguments)]
pub fn bm25(
    term_count_in_doc: u32,
    doc_freq: u64,
    doc_count: u64,
    doc_len: u32,
    total_tokens: u64,
) -> f64 {
    if term_count_in_doc == 0 {
        return f64::NAN;
    }
    let adl = total_tokens as f64 / doc_count as f64;
    if adl == 0.0 {
        return f64::NAN;
    }
    let tf = ((term_count_in_doc + 1) as f64).ln();
    let tf25 = tf / (tf + BM25_K * (1.0 - BM25_B + BM25_B * doc_len as f64 / adl));
    let idf25 = (((doc_count as f64 - doc_freq as f64 + 0.5) / (doc_freq as f64 + 0.5)) + 1.0).ln();
    tf25 * idf25
}

pub fn score(
    algo: RankingAlgo,
    term_count_in_doc: u32,
    doc_freq: u64,
    doc_count: u64,
    doc_len: u32,
    total_tokens: u64,
) -> f64 {
    match algo {
        RankingAlgo::TfIdf => tf_idf(term_count_in_doc, doc_freq, doc_count),
        RankingAlgo::Bm25 => bm25(term_count_in_doc, doc_freq, doc_count, doc_len, total_tokens),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tf_idf_matches_the_worked_example() {
        let score = tf_idf(1, 1, 2);
        assert!((score - 1.1736).abs() < 1e-3, "got {score}");
    }

    #[test]
    fn tf_idf_shared_term_scores_equal_when_doc_freq_equals_doc_count() {
        let score = tf_idf(1, 2, 2);
        assert!((score - 0.6931).abs() < 1e-3, "got {score}");
    }

    #[test]
    fn zero_count_is_nan() {
        assert!(tf_idf(0, 1, 2).is_nan());
        assert!(bm25(0, 1, 2, 5, 10).is_nan());
    }

    #[test]
    fn bm25_zero_average_doc_length_is_nan() {
        assert!(bm25(1, 1, 2, 5, 0).is_nan());
    }

    #[test]
    fn parse_is_case_insensitive_and_accepts_both_spellings() {
        assert_eq!(RankingAlgo::parse("bm25"), Some(RankingAlgo::Bm25));
        assert_eq!(RankingAlgo::parse("TF-IDF"), Some(RankingAlgo::TfIdf));
        assert_eq!(RankingAlgo::parse("tfidf"), Some(RankingAlgo::TfIdf));
        assert_eq!(RankingAlgo::parse("nonsense"), None);
    }
}
