//! 変換可否の決定手続き
//!
//! マクロ展開は呼び出しによる名前（引数はテキスト置換され出現ごとに
//! 評価される）、関数呼び出しは呼び出しによる値（引数は呼び出し前に
//! ちょうど1回評価される）。両者の意味が一致する条件を静的検査で
//! 証明できたサイトだけを Transformable と判定する。
//!
//! 条件は表の順に検査し、最初に破れた条件が棄却理由になる。同じ
//! 入力に対して常に同じ判定を返す決定性が、後段の重複排除を支える。

use crate::analysis::Analyzer;
use crate::ast::Expr;
use crate::fn_def::FunctionTable;
use crate::macro_def::{MacroDef, MacroKind, MacroTable, MacroView};
use crate::scope::ScopeShape;

/// 変換戦略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// オブジェクトマクロ → 引数なし関数
    ObjectLikeToNullaryFunction,
    /// 関数マクロ → 同じ仮引数列の関数
    FunctionLikeToFunction,
}

/// 棄却理由（閉じた分類）
///
/// どれも実行を止めるエラーではない。棄却されたサイトは変換されずに
/// 理由つきで報告され、処理は次のサイトへ進む。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// 引数個数がパラメータ個数と合わない
    ArityMismatch,
    /// パラメータ名が重複している
    MalformedMacro,
    /// 本体が別のマクロを展開する
    NestedMacro,
    /// 本体が呼び出し側ローカルを読む
    CapturesCallerScope,
    /// 先行評価できない引数がある
    UnsafeArgument,
    /// 本体がストアを変更する
    SideEffectingBody,
}

impl RejectReason {
    /// レコード用の理由コード
    pub fn code(self) -> &'static str {
        match self {
            RejectReason::ArityMismatch => "arity-mismatch",
            RejectReason::MalformedMacro => "malformed-macro",
            RejectReason::NestedMacro => "nested-macro",
            RejectReason::CapturesCallerScope => "captures-caller-scope",
            RejectReason::UnsafeArgument => "unsafe-argument",
            RejectReason::SideEffectingBody => "side-effecting-body",
        }
    }

    /// 報告用の大分類
    pub fn category(self) -> &'static str {
        match self {
            RejectReason::ArityMismatch | RejectReason::MalformedMacro => "Malformed invocation",
            RejectReason::NestedMacro => "Nested macro",
            RejectReason::CapturesCallerScope => "Hygiene",
            RejectReason::UnsafeArgument => "Unsafe argument",
            RejectReason::SideEffectingBody => "Side effects",
        }
    }

    /// 人間向けの説明
    pub fn message(self) -> &'static str {
        match self {
            RejectReason::ArityMismatch => "argument count differs from parameter count",
            RejectReason::MalformedMacro => "duplicate parameter names",
            RejectReason::NestedMacro => "macro body expands another macro",
            RejectReason::CapturesCallerScope => "macro body reads a variable local to the call site",
            RejectReason::UnsafeArgument => {
                "argument cannot be evaluated eagerly without changing behavior"
            }
            RejectReason::SideEffectingBody => "macro body mutates the store",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// 判定結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// 変換可能
    Transformable(Strategy),
    /// 変換不能
    NotTransformable(RejectReason),
}

impl Verdict {
    /// 変換可能か
    pub fn is_transformable(&self) -> bool {
        matches!(self, Verdict::Transformable(_))
    }
}

/// マクロ展開サイト1件の変換可否を判定する
///
/// 条件の検査順:
/// 1. 引数個数 = パラメータ個数
/// 2. パラメータ名に重複なし
/// 3. 本体にマクロ展開なし（自分自身は隠したビューで判定）
/// 4. 本体が呼び出し側ローカルを読まない（パラメータ名は除外）
/// 5. 各引数が先行評価可能（関数マクロのみ）
/// 6. 本体に副作用なし。ただし本体が単なる変数参照なら条件5だけで
///    健全（純粋な引数を変数出現へ置換するのは構成的に安全）
pub fn decide(
    def: &MacroDef,
    args: &[Expr],
    scope: &ScopeShape,
    functions: &FunctionTable,
    macros: &MacroTable,
) -> Verdict {
    // 本体の検査は自身を隠したビュー、引数の検査は完全なビューで行う。
    // 引数は呼び出し側の文脈の式であり、そこに現れた自身の再帰呼び出し
    // はネスト展開として数えなければならない。
    let body_sight = Analyzer::new(functions, MacroView::new(macros).hide(def.name));
    let call_sight = Analyzer::new(functions, MacroView::new(macros));

    if args.len() != def.param_count() {
        return Verdict::NotTransformable(RejectReason::ArityMismatch);
    }

    if def.has_duplicate_params() {
        return Verdict::NotTransformable(RejectReason::MalformedMacro);
    }

    if body_sight.contains_macro_invocation(&def.body) {
        return Verdict::NotTransformable(RejectReason::NestedMacro);
    }

    if body_sight.references_caller_locals(&def.body, scope, def.params()) {
        return Verdict::NotTransformable(RejectReason::CapturesCallerScope);
    }

    if args.iter().any(|a| !call_sight.eager_safe(a)) {
        return Verdict::NotTransformable(RejectReason::UnsafeArgument);
    }

    if !def.body.is_bare_var() && body_sight.has_side_effects(&def.body) {
        return Verdict::NotTransformable(RejectReason::SideEffectingBody);
    }

    let strategy = match def.kind {
        MacroKind::Object => Strategy::ObjectLikeToNullaryFunction,
        MacroKind::Function { .. } => Strategy::FunctionLikeToFunction,
    };
    Verdict::Transformable(strategy)
}
