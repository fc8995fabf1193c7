/*!
 * Tests for chunk DNA extraction
 */

use doctran::chunking::dna::{detect_language, extract, DnaExtractor};
use doctran::chunking::{Chunk, StyleCategory};

#[test]
fn test_detectLanguage_vietnameseDiacritics_shouldBeVi() {
    assert_eq!(detect_language("Chúng tôi đang học tiếng Việt ở Hà Nội."), "vi");
    // French accents alone are not Vietnamese
    assert_eq!(detect_language("Le café est très agréable à côté de la gare."), "en");
}

#[test]
fn test_detectLanguage_japaneseWithKanji_shouldBeJa() {
    assert_eq!(detect_language("東京は日本の首都です。"), "ja");
    assert_eq!(detect_language("北京是中国的首都。"), "zh");
    assert_eq!(detect_language("서울은 한국의 수도입니다."), "ko");
}

#[test]
fn test_extract_academicText_shouldFindStyleAndReferences() {
    let text = "This study extends earlier research [1] on coastal erosion. The methodology follows \
                (Smith et al., 2019) and the findings confirm the hypothesis [2]. See also [1].";

    let dna = extract(text);

    assert_eq!(dna.style, StyleCategory::Academic);
    assert_eq!(dna.references, vec!["[1]", "(Smith et al., 2019)", "[2]"]);
    assert!(dna.sentence_count >= 2);
}

#[test]
fn test_extract_fencedCode_shouldFlagCode() {
    let text = "Call the API like this:\n\n```rust\nlet client = Client::new();\n```\n";
    let dna = extract(text);

    assert!(dna.has_code);
    assert!(!dna.has_table);
}

#[test]
fn test_extract_namedEntities_shouldKeepPhrasesAndAcronyms() {
    let text = "The delegation from New Zealand met NASA engineers in Houston. They praised the mission.";
    let dna = extract(text);

    assert!(dna.entities.contains(&"New Zealand".to_string()));
    assert!(dna.entities.contains(&"NASA".to_string()));
    assert!(dna.entities.contains(&"Houston".to_string()));
    // Sentence-initial function words are dropped
    assert!(!dna.entities.contains(&"The".to_string()));
    assert!(!dna.entities.contains(&"They".to_string()));
}

#[test]
fn test_extract_emptyContent_shouldUseNeutralValues() {
    let dna = extract("");

    assert_eq!(dna.word_count, 0);
    assert_eq!(dna.complexity, 0);
    assert_eq!(dna.sentiment, 0.5);
    assert!(dna.topics.is_empty());
    assert!(dna.entities.is_empty());
}

#[test]
fn test_extract_tabSeparatedRows_shouldFlagTable() {
    let text = "name\tcount\tprice\napples\t3\t1.20\npears\t5\t0.80\n";
    assert!(extract(text).has_table);
}

#[test]
fn test_extractBatch_singleSlot_shouldStillCoverEveryChunk() {
    let mut chunks: Vec<Chunk> = (0..12)
        .map(|i| Chunk::new(0, i, format!("Paragraph number {} mentions Berlin.", i), 8, i * 40))
        .collect();

    tokio_test::block_on(DnaExtractor::new(1).extract_batch(&mut chunks));

    for chunk in &chunks {
        let dna = chunk.dna.as_ref().expect("every chunk gets DNA");
        assert!(dna.entities.contains(&"Berlin".to_string()));
    }
}

#[test]
fn test_dnaExtractor_zeroConcurrency_shouldClampToOne() {
    assert_eq!(DnaExtractor::new(0).concurrency(), 1);
}
