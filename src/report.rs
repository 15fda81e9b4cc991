//! 変換結果の構造化レポート
//!
//! マクロ定義・展開サイト・判定のそれぞれについて1イベント=1レコード
//! を追記する純粋な書き込みシンク。変換判定には一切影響しない。
//! 行形式（`MACRO2FN:` 接頭辞、後段ツール向け）と JSON の両方に
//! 書き出せる。

use std::io::{self, Write};

use serde::Serialize;

/// レポートの1レコード
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Record {
    /// マクロ定義の観測
    MacroDefinition { hash: String, loc: String },
    /// マクロ展開サイトの観測
    MacroExpansion { hash: String, loc: String },
    /// 生成された関数定義
    TransformedDefinition {
        hash: String,
        signature: String,
        name: String,
    },
    /// 書き換えられた展開サイト
    TransformedExpansion {
        hash: String,
        loc: String,
        enclosing: String,
        name: String,
    },
    /// 棄却された展開サイト
    UntransformedExpansion {
        hash: String,
        loc: String,
        enclosing: String,
        category: String,
        reason: String,
    },
}

/// 行形式の接頭辞
pub const LINE_PREFIX: &str = "MACRO2FN:";

/// レポートシンク
#[derive(Debug, Default)]
pub struct Reporter {
    records: Vec<Record>,
}

impl Reporter {
    /// 新しいレポーターを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// マクロ定義を記録
    pub fn macro_definition(&mut self, hash: u64, loc: String) {
        self.records.push(Record::MacroDefinition {
            hash: format!("{:016x}", hash),
            loc,
        });
    }

    /// マクロ展開を記録
    pub fn macro_expansion(&mut self, hash: u64, loc: String) {
        self.records.push(Record::MacroExpansion {
            hash: format!("{:016x}", hash),
            loc,
        });
    }

    /// 生成関数の定義を記録
    pub fn transformed_definition(&mut self, hash: u64, signature: String, name: String) {
        self.records.push(Record::TransformedDefinition {
            hash: format!("{:016x}", hash),
            signature,
            name,
        });
    }

    /// 書き換えた展開サイトを記録
    pub fn transformed_expansion(
        &mut self,
        hash: u64,
        loc: String,
        enclosing: String,
        name: String,
    ) {
        self.records.push(Record::TransformedExpansion {
            hash: format!("{:016x}", hash),
            loc,
            enclosing,
            name,
        });
    }

    /// 棄却した展開サイトを記録
    pub fn untransformed_expansion(
        &mut self,
        hash: u64,
        loc: String,
        enclosing: String,
        category: &str,
        reason: &str,
    ) {
        self.records.push(Record::UntransformedExpansion {
            hash: format!("{:016x}", hash),
            loc,
            enclosing,
            category: category.to_string(),
            reason: reason.to_string(),
        });
    }

    /// 記録済みレコード
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// レコード数
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// レコードが無いか
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 行形式で書き出す（1レコード1行）
    pub fn write_lines<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for r in &self.records {
            match r {
                Record::MacroDefinition { hash, loc } => {
                    writeln!(w, "{}Macro Definition,\"{}\",{}", LINE_PREFIX, hash, loc)?;
                }
                Record::MacroExpansion { hash, loc } => {
                    writeln!(w, "{}Macro Expansion,\"{}\",{}", LINE_PREFIX, hash, loc)?;
                }
                Record::TransformedDefinition {
                    hash,
                    signature,
                    name,
                } => {
                    writeln!(
                        w,
                        "{}Transformed Definition,\"{}\",\"{}\",{}",
                        LINE_PREFIX, hash, signature, name
                    )?;
                }
                Record::TransformedExpansion {
                    hash,
                    loc,
                    enclosing,
                    name,
                } => {
                    writeln!(
                        w,
                        "{}Transformed Expansion,\"{}\",{},{},{}",
                        LINE_PREFIX, hash, loc, enclosing, name
                    )?;
                }
                Record::UntransformedExpansion {
                    hash,
                    loc,
                    enclosing,
                    category,
                    reason,
                } => {
                    writeln!(
                        w,
                        "{}Untransformed Expansion,\"{}\",{},{},{},{}",
                        LINE_PREFIX, hash, loc, enclosing, category, reason
                    )?;
                }
            }
        }
        Ok(())
    }

    /// JSONで書き出す
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.records)
    }
}
