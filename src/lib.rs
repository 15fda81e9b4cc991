//! macro2fn
//!
//! C プリプロセッサマクロの展開サイトを静的解析し、観測可能な
//! 振る舞いを変えないと証明できたものだけを同等の関数呼び出しへ
//! 書き換える変換エンジン。
//!
//! マクロ展開は呼び出しによる名前、関数呼び出しは呼び出しによる値。
//! 両者が一致する条件（副作用なし・衛生・ネスト展開なし・先行評価
//! 安全な引数）を検査し、証明できないサイトは理由つきで保守的に
//! 残す。健全性を完全性より優先する。

pub mod analysis;
pub mod ast;
pub mod codegen;
pub mod engine;
pub mod error;
pub mod eval;
pub mod fn_def;
pub mod input;
pub mod intern;
pub mod macro_def;
pub mod report;
pub mod scope;
pub mod source;
pub mod transform;

// 主要な型を再エクスポート
pub use analysis::Analyzer;
pub use ast::{substitute, BinOp, Expr, Stmt, UnOp};
pub use codegen::{
    definition_hash, render_expr, render_function, render_signature, shape_key, CodeGen,
    GeneratedDict, Realized, ShapeKey,
};
pub use engine::{Engine, EngineConfig, SiteResult, TransformOutcome, TransformStats};
pub use error::{ContractError, EngineError, EvalError, InputError, Result};
pub use eval::{env_with_globals, EvalResult, Evaluator, Loc, RuntimeEnv, Store};
pub use fn_def::{FnOrigin, FunctionDef, FunctionTable};
pub use input::{ExpansionSite, Program, ProgramSpec};
pub use intern::{InternedStr, StringInterner};
pub use macro_def::{MacroDef, MacroKind, MacroTable, MacroView};
pub use report::{Record, Reporter, LINE_PREFIX};
pub use scope::ScopeShape;
pub use source::{FileId, FileRegistry, SourceLocation};
pub use transform::{decide, RejectReason, Strategy, Verdict};
