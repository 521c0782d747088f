// ==========================================
// CSV 数据导入系统 - 编码规范化
// ==========================================
// 职责: 将声明为旧式单字节编码的原始字节转为 UTF-8
// 规则:
// - UTF8: 原样返回（不转码、不校验，非法字节由解析阶段报告位置）
// - Latin1 (ISO-8859-1): 每个字节即其 Unicode 码位
// - Latin9 (ISO-8859-15): 按 encoding_rs 码表逐字节映射
// - 不允许以替换字符静默替代无法映射的字节
// ==========================================

use crate::domain::types::DeclaredEncoding;
use crate::importer::error::{ImportError, ImportResult};
use encoding_rs::{DecoderResult, ISO_8859_15};

/// 规范化结果（数据总是 UTF-8）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    pub transcoded: bool,
    pub encoding: DeclaredEncoding,
    pub data: Vec<u8>,
}

pub fn normalize(declared: DeclaredEncoding, raw: &[u8]) -> ImportResult<NormalizedText> {
    let data = match declared {
        DeclaredEncoding::Utf8 => raw.to_vec(),
        DeclaredEncoding::Latin1 => decode_latin1(raw).into_bytes(),
        DeclaredEncoding::Latin9 => decode_latin9(raw)?.into_bytes(),
    };

    Ok(NormalizedText {
        transcoded: declared.is_legacy(),
        encoding: DeclaredEncoding::Utf8,
        data,
    })
}

fn decode_latin1(raw: &[u8]) -> String {
    raw.iter().map(|&b| char::from(b)).collect()
}

fn decode_latin9(raw: &[u8]) -> ImportResult<String> {
    let mut decoder = ISO_8859_15.new_decoder_without_bom_handling();
    let capacity = decoder
        .max_utf8_buffer_length_without_replacement(raw.len())
        .unwrap_or(raw.len() * 3);
    let mut out = String::with_capacity(capacity);

    let (result, read) = decoder.decode_to_string_without_replacement(raw, &mut out, true);
    match result {
        DecoderResult::InputEmpty => Ok(out),
        DecoderResult::Malformed(_, _) => Err(ImportError::Encoding {
            encoding: DeclaredEncoding::Latin9.to_string(),
            offset: read.saturating_sub(1),
        }),
        DecoderResult::OutputFull => Err(ImportError::Encoding {
            encoding: DeclaredEncoding::Latin9.to_string(),
            offset: read,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_latin1(text: &str) -> Option<Vec<u8>> {
        text.chars()
            .map(|c| u8::try_from(u32::from(c)).ok())
            .collect()
    }

    #[test]
    fn test_utf8_is_identity() {
        let data = "id;subject\n1;Caf\u{e9}\n".as_bytes();
        let normalized = normalize(DeclaredEncoding::Utf8, data).unwrap();
        assert!(!normalized.transcoded);
        assert_eq!(normalized.data, data);

        let broken = [0x66, 0xFF, 0x6F];
        assert_eq!(normalize(DeclaredEncoding::Utf8, &broken).unwrap().data, broken);
    }

    #[test]
    fn test_latin1_all_bytes_round_trip() {
        let raw: Vec<u8> = (0u8..=255).collect();
        let normalized = normalize(DeclaredEncoding::Latin1, &raw).unwrap();
        assert!(normalized.transcoded);
        assert_eq!(normalized.encoding, DeclaredEncoding::Utf8);

        let text = String::from_utf8(normalized.data).unwrap();
        assert_eq!(text.chars().count(), 256);
        assert_eq!(encode_latin1(&text).unwrap(), raw);
    }

    #[test]
    fn test_latin9_all_bytes_round_trip() {
        let raw: Vec<u8> = (0u8..=255).collect();
        let normalized = normalize(DeclaredEncoding::Latin9, &raw).unwrap();
        let text = String::from_utf8(normalized.data).unwrap();

        let (encoded, _, had_errors) = ISO_8859_15.encode(&text);
        assert!(!had_errors);
        assert_eq!(encoded.as_ref(), raw.as_slice());
    }

    #[test]
    fn test_latin9_euro_sign_differs_from_latin1() {
        let latin9 = normalize(DeclaredEncoding::Latin9, &[0xA4]).unwrap();
        let latin1 = normalize(DeclaredEncoding::Latin1, &[0xA4]).unwrap();
        assert_eq!(String::from_utf8(latin9.data).unwrap(), "\u{20ac}");
        assert_eq!(String::from_utf8(latin1.data).unwrap(), "\u{a4}");
    }
}
