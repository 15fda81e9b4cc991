//! エラー型定義
//!
//! 変換の棄却は正常系（`transform::RejectReason`）であり、ここで
//! 扱うのは致命的な契約違反・入力不備・参照評価器の実行時エラー。

use std::fmt;
use std::path::PathBuf;

use crate::source::{FileRegistry, SourceLocation};

/// フロントエンド契約違反
///
/// 入力データ自体が前段との約束を破っている場合で、パスを続行せず
/// 大きな音を立てて中断する。利用者向けのエラーではない。
#[derive(Debug)]
pub enum ContractError {
    /// マクロテーブルに存在しないマクロへの展開記録
    UndefinedMacro {
        name: String,
        loc: SourceLocation,
    },
}

impl fmt::Display for ContractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractError::UndefinedMacro { name, loc } => write!(
                f,
                "front-end contract violation: expansion of undefined macro '{}' at {}:{}:{}",
                name,
                loc.file_id.as_u32(),
                loc.line,
                loc.column
            ),
        }
    }
}

impl ContractError {
    /// ファイル名を解決してエラーメッセージをフォーマット
    pub fn format_with_files(&self, files: &FileRegistry) -> String {
        match self {
            ContractError::UndefinedMacro { name, loc } => format!(
                "front-end contract violation: expansion of undefined macro '{}' at {}",
                name,
                loc.render(files)
            ),
        }
    }
}

/// プログラム記述の読み込みエラー
#[derive(Debug)]
pub enum InputError {
    /// ファイル読み込みエラー
    Io(PathBuf, String),
    /// JSONデコードエラー
    Json(serde_json::Error),
    /// 未知の単項演算子
    UnknownUnaryOp(String),
    /// 未知の二項演算子
    UnknownBinaryOp(String),
    /// マクロ名の重複定義
    DuplicateMacro(String),
    /// 関数名の重複定義
    DuplicateFunction(String),
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::Io(p, e) => write!(f, "I/O error reading {}: {}", p.display(), e),
            InputError::Json(e) => write!(f, "invalid program description: {}", e),
            InputError::UnknownUnaryOp(s) => write!(f, "unknown unary operator: {:?}", s),
            InputError::UnknownBinaryOp(s) => write!(f, "unknown binary operator: {:?}", s),
            InputError::DuplicateMacro(s) => write!(f, "duplicate macro definition: {}", s),
            InputError::DuplicateFunction(s) => write!(f, "duplicate function definition: {}", s),
        }
    }
}

/// 参照評価器の実行時エラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// 未束縛の変数参照
    UnboundVariable(String),
    /// どのテーブルにも解決しない呼び出し
    UnknownCallee(String),
    /// 呼び出し先の引数個数不一致
    CalleeArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },
    /// ゼロ除算
    DivisionByZero,
    /// 算術オーバーフロー（除算・剰余のみ検査する）
    ArithmeticOverflow,
    /// 変数でない式が代入先に置換された
    InvalidAssignTarget(String),
    /// ステップ上限に到達
    OutOfFuel,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::UnboundVariable(s) => write!(f, "unbound variable: {}", s),
            EvalError::UnknownCallee(s) => write!(f, "call to unknown function or macro: {}", s),
            EvalError::CalleeArityMismatch {
                name,
                expected,
                got,
            } => write!(f, "'{}' expects {} argument(s), got {}", name, expected, got),
            EvalError::DivisionByZero => write!(f, "division by zero"),
            EvalError::ArithmeticOverflow => write!(f, "arithmetic overflow"),
            EvalError::InvalidAssignTarget(s) => {
                write!(f, "assignment target '{}' substituted by a non-variable", s)
            }
            EvalError::OutOfFuel => write!(f, "evaluation step limit exceeded"),
        }
    }
}

impl std::error::Error for EvalError {}

/// 統合エラー型
#[derive(Debug)]
pub enum EngineError {
    /// フロントエンド契約違反
    Contract(ContractError),
    /// 入力記述のエラー
    Input(InputError),
    /// I/Oエラー
    Io(std::io::Error),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Contract(e) => write!(f, "{}", e),
            EngineError::Input(e) => write!(f, "input error: {}", e),
            EngineError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ContractError> for EngineError {
    fn from(e: ContractError) -> Self {
        EngineError::Contract(e)
    }
}

impl From<InputError> for EngineError {
    fn from(e: InputError) -> Self {
        EngineError::Input(e)
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e)
    }
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, EngineError>;
