//! 프롬프트 조합
//!
//! 그래프 결과와 벡터 결과를 라벨이 붙은 섹션 하나의 문자열로 합칩니다.

use crate::knowledge::{ChunkMetadata, Location};

/// 고정 시스템 지시문
pub const SYSTEM_PROMPT: &str =
    "You are a knowledgeable travel assistant. \
     Use the provided context to answer questions accurately.";

const NONE: &str = "none";

/// 컨텍스트 문자열 조합
///
/// ```text
/// Graph Information: Paris (city, France): Capital of France
/// Additional Context:
/// - [travel_info] paris is lovely in spring
/// User Query: Paris
/// ```
pub fn compose_context(
    query: &str,
    location: Option<&Location>,
    chunks: &[ChunkMetadata],
) -> String {
    let mut context = String::new();

    context.push_str("Graph Information: ");
    match location {
        Some(loc) => context.push_str(&describe_location(loc)),
        None => context.push_str(NONE),
    }
    context.push('\n');

    context.push_str("Additional Context:");
    if chunks.is_empty() {
        context.push(' ');
        context.push_str(NONE);
        context.push('\n');
    } else {
        context.push('\n');
        for chunk in chunks {
            context.push_str(&format!("- [{}] {}\n", chunk.kind, chunk.content));
        }
    }

    context.push_str("User Query: ");
    context.push_str(query);
    context.push('\n');

    context
}

fn describe_location(location: &Location) -> String {
    let details: Vec<&str> = [location.kind.as_str(), location.country.as_str()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();

    let mut line = location.name.clone();
    if !details.is_empty() {
        line.push_str(&format!(" ({})", details.join(", ")));
    }
    if !location.description.is_empty() {
        line.push_str(": ");
        line.push_str(&location.description);
    }
    line
}
