//! 関数生成と重複排除
//!
//! Transformable と判定されたマクロから関数定義を合成し、構造キーで
//! インターンする。パラメータ名だけが違う同形のマクロは1つの生成
//! 関数を共有する。生成名は可視などの識別子とも衝突しない新しい
//! 名前で、関数テーブルは単調に成長する。マクロテーブルは変更しない
//! （定義のテキスト除去は外側のツールの仕事）。

use std::collections::HashMap;

use crate::ast::{Expr, Stmt};
use crate::fn_def::{FnOrigin, FunctionDef, FunctionTable};
use crate::intern::{InternedStr, StringInterner};
use crate::macro_def::MacroDef;
use crate::transform::Strategy;

/// 形状キー
///
/// (パラメータ個数, パラメータ名を位置に正規化した本体) の構造
/// ハッシュ。名前の選び方だけが違うマクロは同じキーになる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeKey(u64);

impl ShapeKey {
    /// 内部値を取得
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ShapeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

// 実行間で安定なハッシュが要るので FNV-1a を自前で持つ
// （std のハッシャはシード選択を保証しない）
struct Fnv1a(u64);

impl Fnv1a {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    fn new() -> Self {
        Fnv1a(Self::OFFSET)
    }

    fn write_u8(&mut self, b: u8) {
        self.0 ^= b as u64;
        self.0 = self.0.wrapping_mul(Self::PRIME);
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.write_u8(b);
        }
    }

    fn write_str(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
        self.write_u8(0xff);
    }

    fn write_i64(&mut self, n: i64) {
        self.write_bytes(&n.to_le_bytes());
    }

    fn write_usize(&mut self, n: usize) {
        self.write_bytes(&(n as u64).to_le_bytes());
    }

    fn finish(&self) -> u64 {
        self.0
    }
}

// エンコードタグ。ASTの変種ごとに1バイト。
const TAG_NUM: u8 = 0x01;
const TAG_PARAM: u8 = 0x02;
const TAG_VAR: u8 = 0x03;
const TAG_PAREN: u8 = 0x04;
const TAG_UNARY: u8 = 0x05;
const TAG_BINARY: u8 = 0x06;
const TAG_ASSIGN: u8 = 0x07;
const TAG_INVOKE: u8 = 0x08;

fn encode_expr(
    h: &mut Fnv1a,
    expr: &Expr,
    params: &[InternedStr],
    interner: &StringInterner,
    canonical: bool,
) {
    let param_index = |name: InternedStr| -> Option<usize> {
        if canonical {
            params.iter().position(|&p| p == name)
        } else {
            None
        }
    };

    match expr {
        Expr::Num(n) => {
            h.write_u8(TAG_NUM);
            h.write_i64(*n);
        }
        Expr::Var(x) => match param_index(*x) {
            Some(i) => {
                h.write_u8(TAG_PARAM);
                h.write_usize(i);
            }
            None => {
                h.write_u8(TAG_VAR);
                h.write_str(interner.get(*x));
            }
        },
        Expr::Paren(e) => {
            h.write_u8(TAG_PAREN);
            encode_expr(h, e, params, interner, canonical);
        }
        Expr::Unary(op, e) => {
            h.write_u8(TAG_UNARY);
            h.write_str(op.symbol());
            encode_expr(h, e, params, interner, canonical);
        }
        Expr::Binary(op, lhs, rhs) => {
            h.write_u8(TAG_BINARY);
            h.write_str(op.symbol());
            encode_expr(h, lhs, params, interner, canonical);
            encode_expr(h, rhs, params, interner, canonical);
        }
        Expr::Assign(x, e) => {
            h.write_u8(TAG_ASSIGN);
            match param_index(*x) {
                Some(i) => h.write_usize(i),
                None => h.write_str(interner.get(*x)),
            }
            encode_expr(h, e, params, interner, canonical);
        }
        Expr::Invocation(name, args) => {
            h.write_u8(TAG_INVOKE);
            h.write_str(interner.get(*name));
            h.write_usize(args.len());
            for a in args {
                encode_expr(h, a, params, interner, canonical);
            }
        }
    }
}

/// マクロの形状キーを計算
pub fn shape_key(def: &MacroDef, interner: &StringInterner) -> ShapeKey {
    let mut h = Fnv1a::new();
    h.write_usize(def.param_count());
    encode_expr(&mut h, &def.body, def.params(), interner, true);
    ShapeKey(h.finish())
}

/// マクロ定義の内容ハッシュ（名前とパラメータ名を含む・報告用）
pub fn definition_hash(def: &MacroDef, interner: &StringInterner) -> u64 {
    let mut h = Fnv1a::new();
    h.write_str(interner.get(def.name));
    h.write_u8(if def.is_function() { 1 } else { 0 });
    h.write_usize(def.param_count());
    for &p in def.params() {
        h.write_str(interner.get(p));
    }
    encode_expr(&mut h, &def.body, def.params(), interner, false);
    h.finish()
}

/// 生成済み関数のインターンテーブル
#[derive(Debug, Default)]
pub struct GeneratedDict {
    by_shape: HashMap<ShapeKey, InternedStr>,
}

impl GeneratedDict {
    /// 新しい辞書を作成
    pub fn new() -> Self {
        Self::default()
    }

    /// キーに対応する生成関数名を検索
    pub fn lookup(&self, key: ShapeKey) -> Option<InternedStr> {
        self.by_shape.get(&key).copied()
    }

    /// キーと生成関数名の対応を登録
    pub fn insert(&mut self, key: ShapeKey, name: InternedStr) {
        self.by_shape.insert(key, name);
    }

    /// 登録された形状の数
    pub fn len(&self) -> usize {
        self.by_shape.len()
    }

    /// 辞書が空かどうか
    pub fn is_empty(&self) -> bool {
        self.by_shape.is_empty()
    }
}

/// `realize` の結果
#[derive(Debug, Clone)]
pub struct Realized {
    /// 形状キー
    pub key: ShapeKey,
    /// 生成（または再利用）された関数名
    pub name: InternedStr,
    /// このサイトで新規に生成されたか
    pub created: bool,
}

/// コード生成器
#[derive(Debug)]
pub struct CodeGen {
    dict: GeneratedDict,
    suffix: String,
}

impl Default for CodeGen {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeGen {
    /// デフォルト接尾辞 `_fn` の生成器を作成
    pub fn new() -> Self {
        Self::with_suffix("_fn")
    }

    /// 接尾辞を指定して作成
    pub fn with_suffix(suffix: &str) -> Self {
        Self {
            dict: GeneratedDict::new(),
            suffix: suffix.to_owned(),
        }
    }

    /// Transformable 判定済みマクロの生成関数を確保する
    ///
    /// 同じ形状のマクロが変換済みならその関数名を再利用し、新規なら
    /// 衝突しない名前で関数定義を合成して関数テーブルに登録する。
    /// 生成関数の本体は空文で、マクロ本体がそのまま返り値式になる
    /// （関数マクロの本体は置換しない。引数は呼び出しサイトで値渡し
    /// される）。
    pub fn realize(
        &mut self,
        def: &MacroDef,
        strategy: Strategy,
        functions: &mut FunctionTable,
        interner: &mut StringInterner,
    ) -> Realized {
        let key = shape_key(def, interner);
        if let Some(name) = self.dict.lookup(key) {
            return Realized {
                key,
                name,
                created: false,
            };
        }

        let base = format!("{}{}", interner.get(def.name).to_lowercase(), self.suffix);
        let name = interner.fresh(&base);

        let params = match strategy {
            Strategy::ObjectLikeToNullaryFunction => Vec::new(),
            Strategy::FunctionLikeToFunction => def.params().to_vec(),
        };
        functions.insert(FunctionDef {
            name,
            params,
            body: Stmt::Skip,
            ret: def.body.clone(),
            origin: FnOrigin::Generated { from: def.name },
        });
        self.dict.insert(key, name);

        Realized {
            key,
            name,
            created: true,
        }
    }

    /// 呼び出しサイトの書き換え
    ///
    /// マクロ名を生成関数名に差し替えるだけで、引数式はそのまま
    /// 引き継ぐ。評価戦略の変化は決定手続きが安全性を証明済み。
    pub fn rewrite_site(name: InternedStr, args: &[Expr]) -> Expr {
        Expr::Invocation(name, args.to_vec())
    }

    /// インターンテーブルへの参照
    pub fn dict(&self) -> &GeneratedDict {
        &self.dict
    }
}

// ============================================================================
// Cテキスト描画
// ============================================================================

/// 式をCソース風テキストに描画
///
/// レポートと `--emit-functions` 用。値領域は機械整数なので型は
/// `int` に固定する（元ツールの型推論は本エンジンの範囲外）。
pub fn render_expr(expr: &Expr, interner: &StringInterner) -> String {
    match expr {
        Expr::Num(n) => n.to_string(),
        Expr::Var(x) => interner.get(*x).to_string(),
        Expr::Paren(e) => format!("({})", render_expr(e, interner)),
        Expr::Unary(op, e) => format!("{}{}", op.symbol(), render_expr(e, interner)),
        Expr::Binary(op, lhs, rhs) => format!(
            "{} {} {}",
            render_expr(lhs, interner),
            op.symbol(),
            render_expr(rhs, interner)
        ),
        Expr::Assign(x, e) => format!("{} = {}", interner.get(*x), render_expr(e, interner)),
        Expr::Invocation(name, args) => {
            let rendered: Vec<_> = args.iter().map(|a| render_expr(a, interner)).collect();
            format!("{}({})", interner.get(*name), rendered.join(", "))
        }
    }
}

/// 関数シグネチャを描画: `int name(int a, int b)`
pub fn render_signature(func: &FunctionDef, interner: &StringInterner) -> String {
    let params: Vec<_> = func
        .params
        .iter()
        .map(|&p| format!("int {}", interner.get(p)))
        .collect();
    let params = if params.is_empty() {
        "void".to_string()
    } else {
        params.join(", ")
    };
    format!("int {}({})", interner.get(func.name), params)
}

/// 関数定義全体を描画
pub fn render_function(func: &FunctionDef, interner: &StringInterner) -> String {
    format!(
        "{} {{ return {}; }}",
        render_signature(func, interner),
        render_expr(&func.ret, interner)
    )
}
