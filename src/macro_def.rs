//! マクロ定義と管理
//!
//! フロントエンドが観測したマクロ定義を表現し、マクロテーブルで
//! 管理する。解析中のルックアップは `MacroView` 経由で行い、
//! 「本体を解析中のマクロを表から取り除く」操作は、共有テーブルを
//! 書き換える代わりに隠し名を積んだ子ビューの導出として実現する。

use std::collections::HashMap;

use crate::ast::Expr;
use crate::intern::InternedStr;
use crate::source::SourceLocation;

/// マクロ定義の種類
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroKind {
    /// オブジェクトマクロ: #define FOO body
    Object,
    /// 関数マクロ: #define FOO(a, b) body
    Function { params: Vec<InternedStr> },
}

/// マクロ定義
///
/// 本体は常に式であり、文の本体という概念はない。
#[derive(Debug, Clone, PartialEq)]
pub struct MacroDef {
    /// マクロ名
    pub name: InternedStr,
    /// マクロの種類
    pub kind: MacroKind,
    /// 本体式
    pub body: Expr,
    /// 定義位置
    pub def_loc: SourceLocation,
}

impl MacroDef {
    /// 新しいオブジェクトマクロを作成
    pub fn object(name: InternedStr, body: Expr, def_loc: SourceLocation) -> Self {
        Self {
            name,
            kind: MacroKind::Object,
            body,
            def_loc,
        }
    }

    /// 新しい関数マクロを作成
    pub fn function(
        name: InternedStr,
        params: Vec<InternedStr>,
        body: Expr,
        def_loc: SourceLocation,
    ) -> Self {
        Self {
            name,
            kind: MacroKind::Function { params },
            body,
            def_loc,
        }
    }

    /// 関数マクロかどうか
    pub fn is_function(&self) -> bool {
        matches!(self.kind, MacroKind::Function { .. })
    }

    /// パラメータ列（オブジェクトマクロなら空）
    pub fn params(&self) -> &[InternedStr] {
        match &self.kind {
            MacroKind::Object => &[],
            MacroKind::Function { params } => params,
        }
    }

    /// パラメータ数
    pub fn param_count(&self) -> usize {
        self.params().len()
    }

    /// パラメータ名に重複があるか
    pub fn has_duplicate_params(&self) -> bool {
        let params = self.params();
        for (i, p) in params.iter().enumerate() {
            if params[i + 1..].contains(p) {
                return true;
            }
        }
        false
    }
}

/// マクロテーブル
#[derive(Debug, Default)]
pub struct MacroTable {
    macros: HashMap<InternedStr, MacroDef>,
}

impl MacroTable {
    /// 新しいマクロテーブルを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// マクロを定義（既存の定義があれば返す）
    pub fn define(&mut self, def: MacroDef) -> Option<MacroDef> {
        self.macros.insert(def.name, def)
    }

    /// マクロ定義を取得
    pub fn get(&self, name: InternedStr) -> Option<&MacroDef> {
        self.macros.get(&name)
    }

    /// マクロが定義されているかどうか
    pub fn is_defined(&self, name: InternedStr) -> bool {
        self.macros.contains_key(&name)
    }

    /// 全マクロをイテレート（順序は不定）
    pub fn iter(&self) -> impl Iterator<Item = (&InternedStr, &MacroDef)> {
        self.macros.iter()
    }

    /// マクロ数
    pub fn len(&self) -> usize {
        self.macros.len()
    }

    /// テーブルが空かどうか
    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }
}

/// マクロテーブルの不変スナップショットビュー
///
/// 隠し名のチェーンを持ち、`hide` で子ビューを導出する。隠された
/// 名前のルックアップは失敗し、同名の関数があればそちらに解決する
/// （展開済みマクロが自身を再帰展開しない規則をこれで実現する）。
#[derive(Debug, Clone)]
pub struct MacroView<'a> {
    table: &'a MacroTable,
    hidden: Vec<InternedStr>,
}

impl<'a> MacroView<'a> {
    /// テーブル全体を見るビューを作成
    pub fn new(table: &'a MacroTable) -> Self {
        Self {
            table,
            hidden: Vec::new(),
        }
    }

    /// `name` を隠した子ビューを導出
    pub fn hide(&self, name: InternedStr) -> MacroView<'a> {
        let mut hidden = self.hidden.clone();
        if !hidden.contains(&name) {
            hidden.push(name);
        }
        MacroView {
            table: self.table,
            hidden,
        }
    }

    /// マクロ定義を取得（隠し名は不可視）
    pub fn get(&self, name: InternedStr) -> Option<&'a MacroDef> {
        if self.hidden.contains(&name) {
            return None;
        }
        self.table.get(name)
    }

    /// このビューでマクロとして見えるか
    pub fn is_macro(&self, name: InternedStr) -> bool {
        self.get(name).is_some()
    }
}
