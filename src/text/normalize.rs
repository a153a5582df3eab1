//! 텍스트 정규화

/// 텍스트 정규화
///
/// - ASCII 영숫자와 공백이 아닌 문자는 공백 하나로 치환
/// - 연속 공백을 하나로 축약
/// - 앞뒤 공백 제거 후 소문자화
///
/// 결과는 항상 `[a-z0-9 ]`만 포함합니다.
pub fn normalize(text: &str) -> String {
    let replaced: String = text
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();

    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}
