use serde::Serialize;

use crate::types::DocumentMode;

/// One output column: header text plus how the exporter treats its cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    pub header: &'static str,
    /// Upper-case the cell on export (plate numbers).
    pub uppercase: bool,
    /// Try to write the cell as a typed date on export.
    pub date: bool,
}

impl ColumnSpec {
    const fn text(header: &'static str) -> Self {
        Self { header, uppercase: false, date: false }
    }

    const fn upper(header: &'static str) -> Self {
        Self { header, uppercase: true, date: false }
    }

    const fn date(header: &'static str) -> Self {
        Self { header, uppercase: false, date: true }
    }
}

/// Fixed, ordered column list for one document mode.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub mode: DocumentMode,
    pub columns: &'static [ColumnSpec],
}

/// Header of the first column in both schemas; holds the unit (subfolder) name.
pub const UNIT_COLUMN: &str = "子文件夹名称";

/// Pattern a date-flagged cell must match to be written as a date.
pub const DATE_PATTERN: &str = "%Y-%m-%d";

/// Excel display format for date cells.
pub const DATE_DISPLAY_FORMAT: &str = "yyyy/mm/dd";

pub static LICENSE_SCHEMA: Schema = Schema {
    mode: DocumentMode::License,
    columns: &[
        ColumnSpec::text(UNIT_COLUMN),
        ColumnSpec::upper("号牌号码"),
        ColumnSpec::text("车辆类型"),
        ColumnSpec::text("所有人"),
        ColumnSpec::text("住址"),
        ColumnSpec::text("发证单位"),
        ColumnSpec::text("使用性质"),
        ColumnSpec::text("品牌型号"),
        ColumnSpec::text("车辆识别代号"),
        ColumnSpec::text("发动机号码"),
        ColumnSpec::date("注册日期"),
        ColumnSpec::date("发证日期"),
    ],
};

pub static INVOICE_SCHEMA: Schema = Schema {
    mode: DocumentMode::Invoice,
    columns: &[
        ColumnSpec::text(UNIT_COLUMN),
        ColumnSpec::text("发票代码"),
        ColumnSpec::text("发票号码"),
        ColumnSpec::date("开票日期"),
        ColumnSpec::text("购买方名称"),
        ColumnSpec::text("销货单位名称"),
        ColumnSpec::text("机器编号"),
        ColumnSpec::text("车辆类型"),
        ColumnSpec::text("厂牌型号"),
        ColumnSpec::text("产地"),
        ColumnSpec::text("合格证号"),
        ColumnSpec::text("进口证明书号"),
        ColumnSpec::text("商检单号"),
        ColumnSpec::text("发动机号码"),
        ColumnSpec::text("车架号码"),
        ColumnSpec::text("价税合计"),
        ColumnSpec::text("电话"),
        ColumnSpec::text("账号"),
        ColumnSpec::text("地址"),
        ColumnSpec::text("开户银行"),
        ColumnSpec::text("增值税税率或征收率"),
        ColumnSpec::text("增值税税额"),
        ColumnSpec::text("主管税务机关及代码"),
        ColumnSpec::text("不含税价"),
    ],
};

impl Schema {
    pub fn for_mode(mode: DocumentMode) -> &'static Schema {
        match mode {
            DocumentMode::License => &LICENSE_SCHEMA,
            DocumentMode::Invoice => &INVOICE_SCHEMA,
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Columns after the unit column, i.e. the ones filled from OCR.
    pub fn field_columns(&self) -> &'static [ColumnSpec] {
        &self.columns[1..]
    }

    pub fn headers(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.header)
    }

    pub fn index_of(&self, header: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.header == header)
    }
}
