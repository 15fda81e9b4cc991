//! フロントエンド入力契約
//!
//! 範囲外の協調コンポーネント（Cをパースするフロントエンド）は、
//! 観測したマクロ定義・関数定義・展開サイトをJSONで渡してくる。
//! このモジュールはその記述をデコードし、名前をインターンした
//! エンジン入力 `Program` に下ろす。
//!
//! 式の表記例:
//! `{"binary": ["+", {"var": "a"}, {"num": 1}]}`

use std::path::Path;

use serde::Deserialize;

use crate::ast::{BinOp, Expr, Stmt, UnOp};
use crate::error::{InputError, Result};
use crate::fn_def::{FunctionDef, FunctionTable};
use crate::intern::{InternedStr, StringInterner};
use crate::macro_def::{MacroDef, MacroTable};
use crate::source::{FileRegistry, SourceLocation};

// ============================================================================
// JSON 記述 (DTO)
// ============================================================================

/// 式の記述
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExprSpec {
    Num(i64),
    Var(String),
    Paren(Box<ExprSpec>),
    Unary(String, Box<ExprSpec>),
    Binary(String, Box<ExprSpec>, Box<ExprSpec>),
    Assign(String, Box<ExprSpec>),
    Invoke(String, Vec<ExprSpec>),
}

/// 文の記述
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StmtSpec {
    Skip,
    Expr(ExprSpec),
    If(ExprSpec, Box<StmtSpec>, Box<StmtSpec>),
    While(ExprSpec, Box<StmtSpec>),
    Block(Vec<StmtSpec>),
}

/// ソース位置の記述
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocSpec {
    pub file: String,
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

/// マクロ定義の記述。`params` が無ければオブジェクトマクロ。
#[derive(Debug, Clone, Deserialize)]
pub struct MacroSpec {
    pub name: String,
    #[serde(default)]
    pub params: Option<Vec<String>>,
    pub body: ExprSpec,
    #[serde(default)]
    pub loc: LocSpec,
}

/// 関数定義の記述
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub body: Vec<StmtSpec>,
    pub ret: ExprSpec,
}

/// マクロ展開サイトの記述
#[derive(Debug, Clone, Deserialize)]
pub struct SiteSpec {
    /// 展開されたマクロ名
    #[serde(rename = "macro")]
    pub macro_name: String,
    /// 引数式（オブジェクトマクロなら空）
    #[serde(default)]
    pub args: Vec<ExprSpec>,
    #[serde(default)]
    pub loc: LocSpec,
    /// 展開を含む最上位宣言の名前
    pub enclosing: String,
    /// サイトで可視なローカル変数名
    #[serde(default)]
    pub locals: Vec<String>,
}

/// プログラム全体の記述
#[derive(Debug, Clone, Deserialize)]
pub struct ProgramSpec {
    #[serde(default)]
    pub macros: Vec<MacroSpec>,
    #[serde(default)]
    pub functions: Vec<FunctionSpec>,
    #[serde(default)]
    pub globals: Vec<String>,
    #[serde(default)]
    pub sites: Vec<SiteSpec>,
}

// ============================================================================
// エンジン入力
// ============================================================================

/// マクロ展開サイト
#[derive(Debug, Clone)]
pub struct ExpansionSite {
    /// 展開されたマクロ名
    pub macro_name: InternedStr,
    /// 引数式
    pub args: Vec<Expr>,
    /// 展開位置
    pub loc: SourceLocation,
    /// 展開を含む最上位宣言の名前
    pub enclosing: InternedStr,
    /// サイトで可視なローカル変数名
    pub locals: Vec<InternedStr>,
}

/// エンジンへの入力一式
///
/// AST・マクロ定義・サイト列は読み取り専用。変換パスが書き込むのは
/// 関数テーブル（単調に成長）とインターナー（生成名の追加）のみ。
#[derive(Debug, Default)]
pub struct Program {
    pub interner: StringInterner,
    pub files: FileRegistry,
    pub macros: MacroTable,
    pub functions: FunctionTable,
    pub globals: Vec<InternedStr>,
    pub sites: Vec<ExpansionSite>,
}

impl Program {
    /// 空のプログラムを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// JSONテキストから読み込む
    pub fn from_json(text: &str) -> Result<Self> {
        let spec: ProgramSpec = serde_json::from_str(text).map_err(InputError::Json)?;
        lower_program(spec)
    }

    /// JSONファイルから読み込む
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| InputError::Io(path.to_path_buf(), e.to_string()))?;
        Self::from_json(&text)
    }
}

// ============================================================================
// 下ろし (lowering)
// ============================================================================

fn lower_unop(op: &str) -> std::result::Result<UnOp, InputError> {
    match op {
        "-" => Ok(UnOp::Neg),
        "!" => Ok(UnOp::Not),
        "~" => Ok(UnOp::BitNot),
        _ => Err(InputError::UnknownUnaryOp(op.to_string())),
    }
}

fn lower_binop(op: &str) -> std::result::Result<BinOp, InputError> {
    match op {
        "+" => Ok(BinOp::Add),
        "-" => Ok(BinOp::Sub),
        "*" => Ok(BinOp::Mul),
        "/" => Ok(BinOp::Div),
        "%" => Ok(BinOp::Mod),
        "&&" => Ok(BinOp::And),
        "||" => Ok(BinOp::Or),
        "&" => Ok(BinOp::BitAnd),
        "|" => Ok(BinOp::BitOr),
        "^" => Ok(BinOp::BitXor),
        "==" => Ok(BinOp::Eq),
        "!=" => Ok(BinOp::Ne),
        "<" => Ok(BinOp::Lt),
        "<=" => Ok(BinOp::Le),
        ">" => Ok(BinOp::Gt),
        ">=" => Ok(BinOp::Ge),
        _ => Err(InputError::UnknownBinaryOp(op.to_string())),
    }
}

fn lower_expr(
    spec: &ExprSpec,
    interner: &mut StringInterner,
) -> std::result::Result<Expr, InputError> {
    Ok(match spec {
        ExprSpec::Num(n) => Expr::Num(*n),
        ExprSpec::Var(name) => Expr::Var(interner.intern(name)),
        ExprSpec::Paren(inner) => Expr::Paren(Box::new(lower_expr(inner, interner)?)),
        ExprSpec::Unary(op, inner) => {
            Expr::Unary(lower_unop(op)?, Box::new(lower_expr(inner, interner)?))
        }
        ExprSpec::Binary(op, lhs, rhs) => Expr::Binary(
            lower_binop(op)?,
            Box::new(lower_expr(lhs, interner)?),
            Box::new(lower_expr(rhs, interner)?),
        ),
        ExprSpec::Assign(name, rhs) => Expr::Assign(
            interner.intern(name),
            Box::new(lower_expr(rhs, interner)?),
        ),
        ExprSpec::Invoke(name, args) => {
            let mut lowered = Vec::with_capacity(args.len());
            for a in args {
                lowered.push(lower_expr(a, interner)?);
            }
            Expr::Invocation(interner.intern(name), lowered)
        }
    })
}

fn lower_stmt(
    spec: &StmtSpec,
    interner: &mut StringInterner,
) -> std::result::Result<Stmt, InputError> {
    Ok(match spec {
        StmtSpec::Skip => Stmt::Skip,
        StmtSpec::Expr(e) => Stmt::Expr(lower_expr(e, interner)?),
        StmtSpec::If(cond, then_spec, else_spec) => Stmt::IfElse {
            cond: lower_expr(cond, interner)?,
            then_stmt: Box::new(lower_stmt(then_spec, interner)?),
            else_stmt: Box::new(lower_stmt(else_spec, interner)?),
        },
        StmtSpec::While(cond, body) => Stmt::While {
            cond: lower_expr(cond, interner)?,
            body: Box::new(lower_stmt(body, interner)?),
        },
        StmtSpec::Block(stmts) => {
            let mut lowered = Vec::with_capacity(stmts.len());
            for s in stmts {
                lowered.push(lower_stmt(s, interner)?);
            }
            Stmt::Compound(lowered)
        }
    })
}

fn lower_loc(spec: &LocSpec, files: &mut FileRegistry) -> SourceLocation {
    let file = if spec.file.is_empty() {
        "<unknown>"
    } else {
        &spec.file
    };
    SourceLocation::new(files.register(file), spec.line, spec.column)
}

fn lower_program(spec: ProgramSpec) -> Result<Program> {
    let mut program = Program::new();

    for m in &spec.macros {
        let name = program.interner.intern(&m.name);
        if program.macros.is_defined(name) {
            return Err(InputError::DuplicateMacro(m.name.clone()).into());
        }
        let body = lower_expr(&m.body, &mut program.interner)?;
        let loc = lower_loc(&m.loc, &mut program.files);
        let def = match &m.params {
            None => MacroDef::object(name, body, loc),
            Some(params) => {
                let params = params
                    .iter()
                    .map(|p| program.interner.intern(p))
                    .collect();
                MacroDef::function(name, params, body, loc)
            }
        };
        program.macros.define(def);
    }

    for f in &spec.functions {
        let name = program.interner.intern(&f.name);
        if program.functions.contains(name) {
            return Err(InputError::DuplicateFunction(f.name.clone()).into());
        }
        let params = f
            .params
            .iter()
            .map(|p| program.interner.intern(p))
            .collect();
        let body = if f.body.is_empty() {
            Stmt::Skip
        } else {
            let mut stmts = Vec::with_capacity(f.body.len());
            for s in &f.body {
                stmts.push(lower_stmt(s, &mut program.interner)?);
            }
            Stmt::Compound(stmts)
        };
        let ret = lower_expr(&f.ret, &mut program.interner)?;
        program
            .functions
            .insert(FunctionDef::source(name, params, body, ret));
    }

    program.globals = spec
        .globals
        .iter()
        .map(|g| program.interner.intern(g))
        .collect();

    for s in &spec.sites {
        let macro_name = program.interner.intern(&s.macro_name);
        let mut args = Vec::with_capacity(s.args.len());
        for a in &s.args {
            args.push(lower_expr(a, &mut program.interner)?);
        }
        let loc = lower_loc(&s.loc, &mut program.files);
        let enclosing = program.interner.intern(&s.enclosing);
        let locals = s.locals.iter().map(|l| program.interner.intern(l)).collect();
        program.sites.push(ExpansionSite {
            macro_name,
            args,
            loc,
            enclosing,
            locals,
        });
    }

    Ok(program)
}
