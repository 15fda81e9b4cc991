//! 変換対象の最小抽象構文木
//!
//! マクロ本体・関数本体・呼び出しサイトの式が共有する表現。
//! フロントエンドが構築し、本エンジンからは読み取り専用。
//! 構造キー計算に使うため `Eq`/`Hash` を導出している。

use crate::intern::InternedStr;

/// 単項演算子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    /// 算術否定 `-`
    Neg,
    /// 論理否定 `!`
    Not,
    /// ビット反転 `~`
    BitNot,
}

impl UnOp {
    /// C表記
    pub fn symbol(self) -> &'static str {
        match self {
            UnOp::Neg => "-",
            UnOp::Not => "!",
            UnOp::BitNot => "~",
        }
    }
}

/// 二項演算子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    /// 論理AND（短絡評価）
    And,
    /// 論理OR（短絡評価）
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinOp {
    /// C表記
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
        }
    }

    /// 右辺の評価を省略しうるか
    pub fn is_short_circuit(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }
}

/// 式
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    /// 整数リテラル
    Num(i64),
    /// 変数参照
    Var(InternedStr),
    /// 括弧
    Paren(Box<Expr>),
    /// 単項式
    Unary(UnOp, Box<Expr>),
    /// 二項式
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// 代入（左辺は変数名に限る）
    Assign(InternedStr, Box<Expr>),
    /// 呼び出し
    ///
    /// 関数呼び出しとマクロ展開を同じ形で表す。どちらに解決するかは
    /// 解析時の二段階ルックアップ（マクロテーブル優先）で決まる。
    Invocation(InternedStr, Vec<Expr>),
}

impl Expr {
    /// 括弧を剥がした中身
    pub fn strip_paren(&self) -> &Expr {
        let mut e = self;
        while let Expr::Paren(inner) = e {
            e = inner;
        }
        e
    }

    /// 単なる変数参照か（括弧は無視する）
    pub fn is_bare_var(&self) -> bool {
        matches!(self.strip_paren(), Expr::Var(_))
    }
}

/// 文
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Stmt {
    /// 空文
    Skip,
    /// 式文
    Expr(Expr),
    /// if-else文
    IfElse {
        cond: Expr,
        then_stmt: Box<Stmt>,
        else_stmt: Box<Stmt>,
    },
    /// while文
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    /// 複合文
    Compound(Vec<Stmt>),
}

/// パラメータ出現に引数式をテキスト置換する
///
/// 呼び出しによる名前（call-by-name）意味論の核。引数式は出現ごとに
/// そのまま埋め込まれ、評価は使用側に委ねられる。代入の左辺に現れた
/// パラメータは、引数が（括弧を除いて）変数参照であればその変数に
/// 差し替え、そうでなければパラメータ名を `Err` で返す。
pub fn substitute(
    body: &Expr,
    params: &[InternedStr],
    args: &[Expr],
) -> std::result::Result<Expr, InternedStr> {
    debug_assert_eq!(params.len(), args.len());

    let arg_of = |name: InternedStr| -> Option<&Expr> {
        params.iter().position(|&p| p == name).map(|i| &args[i])
    };

    let e = match body {
        Expr::Num(n) => Expr::Num(*n),
        Expr::Var(x) => match arg_of(*x) {
            Some(arg) => arg.clone(),
            None => Expr::Var(*x),
        },
        Expr::Paren(inner) => Expr::Paren(Box::new(substitute(inner, params, args)?)),
        Expr::Unary(op, inner) => Expr::Unary(*op, Box::new(substitute(inner, params, args)?)),
        Expr::Binary(op, lhs, rhs) => Expr::Binary(
            *op,
            Box::new(substitute(lhs, params, args)?),
            Box::new(substitute(rhs, params, args)?),
        ),
        Expr::Assign(x, rhs) => {
            let target = match arg_of(*x) {
                Some(arg) => match arg.strip_paren() {
                    Expr::Var(v) => *v,
                    _ => return Err(*x),
                },
                None => *x,
            };
            Expr::Assign(target, Box::new(substitute(rhs, params, args)?))
        }
        Expr::Invocation(name, inv_args) => {
            let mut out = Vec::with_capacity(inv_args.len());
            for a in inv_args {
                out.push(substitute(a, params, args)?);
            }
            Expr::Invocation(*name, out)
        }
    };
    Ok(e)
}
