//! Label/value pairing for invoice token streams.
//!
//! The invoice endpoint hands back recognized text in reading order rather than
//! as key/value pairs. Labels printed on the invoice are matched against a fixed
//! vocabulary; for most of them the value is the token that follows, for a few
//! the service already attaches the value to the label token itself.
//!
//! The vocabulary split has only been checked against the standard
//! 机动车销售统一发票 layout.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use crate::types::OcrToken;

/// Labels whose value arrives on the same token.
pub const INLINE_VALUE_LABELS: &[&str] = &["发票代码", "发票号码", "开票日期", "购买方名称", "销货单位名称"];

/// Labels whose value is the next token in reading order.
pub const NEXT_TOKEN_LABELS: &[&str] = &[
    "机器编号",
    "车辆类型",
    "厂牌型号",
    "产地",
    "合格证号",
    "进口证明书号",
    "商检单号",
    "发动机号码",
    "车架号码",
    "价税合计",
    "电话",
    "账号",
    "地址",
    "开户银行",
    "增值税税率或征收率",
    "增值税税额",
    "主管税务机关及代码",
    "不含税价",
];

/// Turns an invoice token stream into a label -> value map.
pub trait FieldResolver: Send + Sync {
    fn resolve(&self, tokens: &[OcrToken]) -> HashMap<String, String>;
}

/// Pairs labels with values by position in the token stream.
#[derive(Debug, Clone)]
pub struct PositionalResolver {
    next_token: HashSet<&'static str>,
    inline: HashSet<&'static str>,
}

impl PositionalResolver {
    pub fn new(next_token: &[&'static str], inline: &[&'static str]) -> Self {
        Self {
            next_token: next_token.iter().copied().collect(),
            inline: inline.iter().copied().collect(),
        }
    }
}

impl Default for PositionalResolver {
    fn default() -> Self {
        Self::new(NEXT_TOKEN_LABELS, INLINE_VALUE_LABELS)
    }
}

impl FieldResolver for PositionalResolver {
    fn resolve(&self, tokens: &[OcrToken]) -> HashMap<String, String> {
        let mut ordered: Vec<&OcrToken> = tokens.iter().collect();
        ordered.sort_by_key(|t| t.position);

        let mut fields = HashMap::new();
        for (i, token) in ordered.iter().enumerate() {
            let label = token.text.as_str();
            if self.next_token.contains(label) {
                let value = ordered.get(i + 1).map(|t| t.text.clone()).unwrap_or_default();
                fields.insert(label.to_string(), value);
            } else if self.inline.contains(label) {
                fields.insert(label.to_string(), token.value.clone().unwrap_or_default());
            }
        }
        fields
    }
}

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_invoice_code, r"^\d{10,12}$");
re!(re_invoice_number, r"^\d{8}$");

/// Fill an empty 发票代码 / 发票号码 from bare digit tokens. Paired values are never replaced.
pub fn fill_invoice_codes(tokens: &[OcrToken], fields: &mut HashMap<String, String>) {
    let candidates: Vec<&str> = tokens
        .iter()
        .flat_map(|t| std::iter::once(t.text.as_str()).chain(t.value.as_deref()))
        .collect();
    fill_codes_from(&candidates, fields);
}

/// Same fallback over the values of an already keyed result, taken in label order.
pub fn fill_invoice_codes_from_fields(fields: &mut HashMap<String, String>) {
    let mut keyed: Vec<(String, String)> = fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    keyed.sort();
    let candidates: Vec<&str> = keyed.iter().map(|(_, v)| v.as_str()).collect();
    fill_codes_from(&candidates, fields);
}

fn fill_codes_from(candidates: &[&str], fields: &mut HashMap<String, String>) {
    for (label, re) in [("发票代码", re_invoice_code()), ("发票号码", re_invoice_number())] {
        let missing = fields.get(label).map_or(true, |v| v.trim().is_empty());
        if !missing {
            continue;
        }
        if let Some(s) = candidates.iter().map(|c| c.trim()).find(|s| re.is_match(s)) {
            fields.insert(label.to_string(), s.to_string());
        }
    }
}
