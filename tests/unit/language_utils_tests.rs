/*!
 * Tests for ISO language code handling
 */

use doctran::language_utils::{
    get_language_name, language_codes_match, normalize_to_part1_or_part2t, normalize_to_part2t,
    validate_language_code, LanguageCodeType,
};

#[test]
fn test_validateLanguageCode_caseAndWhitespace_shouldBeAccepted() {
    assert_eq!(validate_language_code(" EN ").unwrap(), LanguageCodeType::Part1);
    assert_eq!(validate_language_code("Deu").unwrap(), LanguageCodeType::Part2T);
}

#[test]
fn test_validateLanguageCode_invalidInput_shouldFail() {
    for code in ["", "e", "zz", "english", "fr-FR"] {
        assert!(validate_language_code(code).is_err(), "'{}' should be rejected", code);
    }
}

#[test]
fn test_normalizeToPart1OrPart2t_withoutPart1_shouldKeepThreeLetters() {
    // Hawaiian has no two-letter code
    assert_eq!(normalize_to_part1_or_part2t("haw").unwrap(), "haw");
    assert_eq!(normalize_to_part1_or_part2t("fra").unwrap(), "fr");
    assert_eq!(normalize_to_part1_or_part2t("chi").unwrap(), "zh");
}

#[test]
fn test_normalizeToPart2t_shouldMapEveryForm() {
    assert_eq!(normalize_to_part2t("ja").unwrap(), "jpn");
    assert_eq!(normalize_to_part2t("dut").unwrap(), "nld");
    assert!(normalize_to_part2t("xx").is_err());
}

#[test]
fn test_getLanguageName_shouldReturnEnglishName() {
    assert_eq!(get_language_name("vi").unwrap(), "Vietnamese");
    assert_eq!(get_language_name("ger").unwrap(), "German");
    assert!(get_language_name("??").is_err());
}

#[test]
fn test_languageCodesMatch_sameLanguageDifferentForms() {
    assert!(language_codes_match("fr", "fre"));
    assert!(language_codes_match("FRA", "fr"));
    assert!(!language_codes_match("ko", "ja"));
}
