use super::*;

fn kinds(src: &str) -> Vec<TokenKind> {
    lex("t", src)
        .unwrap()
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

#[test]
fn keywords_names_and_operators() {
    assert_eq!(
        kinds("local x = a ~= b .. 'c'"),
        vec![
            TokenKind::Local,
            TokenKind::Ident("x".to_owned()),
            TokenKind::Assign,
            TokenKind::Ident("a".to_owned()),
            TokenKind::Ne,
            TokenKind::Ident("b".to_owned()),
            TokenKind::DotDot,
            TokenKind::Str("c".to_owned()),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn numbers_support_hex_fraction_and_exponent() {
    assert_eq!(
        kinds("0xFF8800FF 1.5 .25 2e3 7E-1"),
        vec![
            TokenKind::Number(f64::from(0xFF88_00FFu32)),
            TokenKind::Number(1.5),
            TokenKind::Number(0.25),
            TokenKind::Number(2000.0),
            TokenKind::Number(0.7),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn number_followed_by_concat_is_not_a_fraction() {
    assert_eq!(
        kinds("1..2"),
        vec![
            TokenKind::Number(1.0),
            TokenKind::DotDot,
            TokenKind::Number(2.0),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn comments_are_skipped_and_lines_counted() {
    let toks = lex("t", "-- one\n--[[ two\nthree ]]\nx").unwrap();
    assert_eq!(toks[0].kind, TokenKind::Ident("x".to_owned()));
    assert_eq!(toks[0].line, 4);
}

#[test]
fn string_escapes_and_long_strings() {
    assert_eq!(
        kinds(r#""a\tb\n" [[raw\n]] [==[x]]y]==]"#),
        vec![
            TokenKind::Str("a\tb\n".to_owned()),
            TokenKind::Str("raw\\n".to_owned()),
            TokenKind::Str("x]]y".to_owned()),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn non_ascii_text_survives_in_strings() {
    assert_eq!(
        kinds("'héllo ✓'"),
        vec![TokenKind::Str("héllo ✓".to_owned()), TokenKind::Eof]
    );
}

#[test]
fn errors_carry_chunk_and_line() {
    let err = lex("card", "x = 1\ny = 'open").unwrap_err();
    assert_eq!(err.to_string(), "script error: card:2: unfinished string");

    let err = lex("card", "x = $").unwrap_err();
    assert!(err.to_string().contains("card:1: unexpected character '$'"));

    let err = lex("card", "x = 1e").unwrap_err();
    assert!(err.to_string().contains("exponent"));
}
