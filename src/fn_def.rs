//! 関数定義と管理
//!
//! フロントエンド由来の関数と、本エンジンが生成した関数を同じ
//! テーブルで管理する。テーブルは単調に成長し、削除操作はない。

use std::collections::HashMap;

use crate::ast::{Expr, Stmt};
use crate::intern::InternedStr;

/// 関数の出自
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FnOrigin {
    /// 入力プログラム由来
    Source,
    /// 変換エンジンがマクロから生成
    Generated { from: InternedStr },
}

/// 関数定義
///
/// 本体文を実行したあとに返り値式を評価する。生成関数の本体は常に
/// `Skip` で、マクロ本体はそのまま返り値式になる。
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    /// 関数名
    pub name: InternedStr,
    /// 仮引数列（重複なしが前提）
    pub params: Vec<InternedStr>,
    /// 本体文
    pub body: Stmt,
    /// 返り値式
    pub ret: Expr,
    /// 出自
    pub origin: FnOrigin,
}

impl FunctionDef {
    /// 入力プログラム由来の関数を作成
    pub fn source(name: InternedStr, params: Vec<InternedStr>, body: Stmt, ret: Expr) -> Self {
        Self {
            name,
            params,
            body,
            ret,
            origin: FnOrigin::Source,
        }
    }

    /// 生成関数かどうか
    pub fn is_generated(&self) -> bool {
        matches!(self.origin, FnOrigin::Generated { .. })
    }
}

/// 関数テーブル
///
/// 挿入順を保持し、生成関数の列挙を決定的にする。
#[derive(Debug, Default)]
pub struct FunctionTable {
    fns: HashMap<InternedStr, FunctionDef>,
    order: Vec<InternedStr>,
}

impl FunctionTable {
    /// 新しい関数テーブルを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 関数を登録（既存の定義があれば返す）
    pub fn insert(&mut self, def: FunctionDef) -> Option<FunctionDef> {
        let name = def.name;
        let old = self.fns.insert(name, def);
        if old.is_none() {
            self.order.push(name);
        }
        old
    }

    /// 関数定義を取得
    pub fn get(&self, name: InternedStr) -> Option<&FunctionDef> {
        self.fns.get(&name)
    }

    /// 関数が存在するか
    pub fn contains(&self, name: InternedStr) -> bool {
        self.fns.contains_key(&name)
    }

    /// 登録順でイテレート
    pub fn iter_in_order(&self) -> impl Iterator<Item = &FunctionDef> {
        self.order.iter().filter_map(|n| self.fns.get(n))
    }

    /// 生成関数のみを登録順でイテレート
    pub fn generated(&self) -> impl Iterator<Item = &FunctionDef> {
        self.iter_in_order().filter(|f| f.is_generated())
    }

    /// 登録された関数数
    pub fn len(&self) -> usize {
        self.fns.len()
    }

    /// テーブルが空かどうか
    pub fn is_empty(&self) -> bool {
        self.fns.is_empty()
    }
}
