//! 출력 형식 및 금액 표시 유틸리티.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Serialize;

/// 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            Self::Json
        } else {
            Self::Table
        }
    }
}

/// 엔 금액을 천 단위 구분자가 있는 정수 문자열로 변환합니다.
///
/// 소수점 이하는 버립니다 (`1234567.89` → `"1,234,567"`).
pub fn humanize_yen(yen: Decimal) -> String {
    let truncated = yen.trunc();
    let digits = truncated.abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if truncated.is_sign_negative() && !truncated.is_zero() {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// 값을 보기 좋은 JSON 문자열로 직렬화합니다.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize to JSON")
}

/// 섹션 제목.
pub fn heading(title: &str) -> String {
    format!("== {} ==\n", title)
}

/// 구분선.
pub fn rule(width: usize) -> String {
    let mut line = "-".repeat(width);
    line.push('\n');
    line
}
