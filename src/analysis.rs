//! 静的解析器
//!
//! 変換可否判定が使う述語を提供する:
//! - 副作用解析: 式の評価がストアを変更しうるか
//! - スコープ/衛生解析: 式が呼び出し側ローカルを参照するか
//! - ネスト展開解析: 式がマクロ呼び出しを含むか
//! - 先行評価安全性: 式を先行評価しても意味が変わらないか
//!
//! いずれも評価を伴わない構造的再帰で、入力ASTを変更しない。
//! 呼び出しの解決はマクロテーブル優先の二段階ルックアップ。
//! 判定対象マクロ自身の隠蔽は、呼び出し側が `MacroView::hide` で
//! 導出したビューを渡すことで表現する。

use crate::ast::{BinOp, Expr, Stmt};
use crate::fn_def::FunctionTable;
use crate::intern::InternedStr;
use crate::macro_def::MacroView;
use crate::scope::ScopeShape;

/// 静的解析器
pub struct Analyzer<'a> {
    functions: &'a FunctionTable,
    macros: MacroView<'a>,
}

impl<'a> Analyzer<'a> {
    /// 新しい解析器を作成
    pub fn new(functions: &'a FunctionTable, macros: MacroView<'a>) -> Self {
        Self { functions, macros }
    }

    // ========================================================================
    // 副作用解析
    // ========================================================================

    /// 式の評価がストアを変更しうるか
    ///
    /// 代入は定義により常に副作用。呼び出しは引数と呼び出し先本体の
    /// 両方を見る。どちらのテーブルにも解決しない名前は保守的に
    /// 副作用ありとみなす。
    pub fn has_side_effects(&self, expr: &Expr) -> bool {
        self.expr_effects(expr, &self.macros, &mut Vec::new())
    }

    fn expr_effects(
        &self,
        expr: &Expr,
        macros: &MacroView<'a>,
        stack: &mut Vec<InternedStr>,
    ) -> bool {
        match expr {
            Expr::Num(_) | Expr::Var(_) => false,
            Expr::Paren(e) | Expr::Unary(_, e) => self.expr_effects(e, macros, stack),
            Expr::Binary(_, lhs, rhs) => {
                self.expr_effects(lhs, macros, stack) || self.expr_effects(rhs, macros, stack)
            }
            Expr::Assign(_, _) => true,
            Expr::Invocation(name, args) => {
                if args.iter().any(|a| self.expr_effects(a, macros, stack)) {
                    return true;
                }
                self.callee_effects(*name, macros, stack)
            }
        }
    }

    /// 呼び出し先本体の副作用
    fn callee_effects(
        &self,
        name: InternedStr,
        macros: &MacroView<'a>,
        stack: &mut Vec<InternedStr>,
    ) -> bool {
        if let Some(def) = macros.get(name) {
            // マクロ本体の解析では自身を隠したビューで再帰する
            return self.expr_effects(&def.body, &macros.hide(name), stack);
        }
        if let Some(func) = self.functions.get(name) {
            // 解析中の関数への再帰呼び出しは純粋と証明できない
            if stack.contains(&name) {
                return true;
            }
            stack.push(name);
            let effects = self.stmt_effects(&func.body, macros, stack)
                || self.expr_effects(&func.ret, macros, stack);
            stack.pop();
            return effects;
        }
        true
    }

    fn stmt_effects(
        &self,
        stmt: &Stmt,
        macros: &MacroView<'a>,
        stack: &mut Vec<InternedStr>,
    ) -> bool {
        match stmt {
            Stmt::Skip => false,
            Stmt::Expr(e) => self.expr_effects(e, macros, stack),
            Stmt::IfElse {
                cond,
                then_stmt,
                else_stmt,
            } => {
                self.expr_effects(cond, macros, stack)
                    || self.stmt_effects(then_stmt, macros, stack)
                    || self.stmt_effects(else_stmt, macros, stack)
            }
            Stmt::While { cond, body } => {
                self.expr_effects(cond, macros, stack) || self.stmt_effects(body, macros, stack)
            }
            Stmt::Compound(stmts) => stmts.iter().any(|s| self.stmt_effects(s, macros, stack)),
        }
    }

    // ========================================================================
    // スコープ/衛生解析
    // ========================================================================

    /// 式が呼び出し側のローカル変数を参照するか
    ///
    /// グローバルの参照は常に許される。`exclude` はマクロ自身の
    /// パラメータ名で、同名の変数参照は生成関数の仮引数に束縛される
    /// ため対象外。偽を返すことが `NoVarsInEnvironment` に相当する。
    pub fn references_caller_locals(
        &self,
        expr: &Expr,
        scope: &ScopeShape,
        exclude: &[InternedStr],
    ) -> bool {
        match expr {
            Expr::Num(_) => false,
            Expr::Var(x) => !exclude.contains(x) && scope.is_local(*x),
            Expr::Paren(e) | Expr::Unary(_, e) => {
                self.references_caller_locals(e, scope, exclude)
            }
            Expr::Binary(_, lhs, rhs) => {
                self.references_caller_locals(lhs, scope, exclude)
                    || self.references_caller_locals(rhs, scope, exclude)
            }
            Expr::Assign(_, e) => self.references_caller_locals(e, scope, exclude),
            Expr::Invocation(_, args) => args
                .iter()
                .any(|a| self.references_caller_locals(a, scope, exclude)),
        }
    }

    // ========================================================================
    // ネスト展開解析
    // ========================================================================

    /// 式がマクロ呼び出しを含むか
    ///
    /// 関数テーブルにのみ解決する呼び出しは数えない。偽を返すことが
    /// `NoMacroInvocations` に相当する。
    pub fn contains_macro_invocation(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Num(_) | Expr::Var(_) => false,
            Expr::Paren(e) | Expr::Unary(_, e) => self.contains_macro_invocation(e),
            Expr::Binary(_, lhs, rhs) => {
                self.contains_macro_invocation(lhs) || self.contains_macro_invocation(rhs)
            }
            Expr::Assign(_, e) => self.contains_macro_invocation(e),
            Expr::Invocation(name, args) => {
                self.macros.is_macro(*name)
                    || args.iter().any(|a| self.contains_macro_invocation(a))
            }
        }
    }

    // ========================================================================
    // 先行評価安全性
    // ========================================================================

    /// 式を先行評価しても意味が変わらないか
    ///
    /// 呼び出しによる名前の下では条件演算の短絡で回避されていた評価
    /// が、関数呼び出しでは引数として必ず起こる。そのため副作用なし・
    /// マクロ展開なしに加えて、評価がトラップしうる演算（ゼロ除算、
    /// 除算オーバーフロー、停止しない呼び出し先）も含まないことを
    /// 要求する。
    pub fn eager_safe(&self, expr: &Expr) -> bool {
        !self.has_side_effects(expr)
            && !self.contains_macro_invocation(expr)
            && !self.may_trap(expr)
    }

    /// 式の評価が失敗または停止しない可能性があるか
    ///
    /// 除数が 0 でも -1 でもない整数リテラルである除算・剰余だけを
    /// 安全とみなす（-1 は `i64::MIN / -1` のオーバーフローを拒否
    /// するため）。while を含む呼び出し先は停止性を証明できないので
    /// トラップ扱い。
    pub fn may_trap(&self, expr: &Expr) -> bool {
        self.expr_traps(expr, &self.macros, &mut Vec::new())
    }

    fn expr_traps(
        &self,
        expr: &Expr,
        macros: &MacroView<'a>,
        stack: &mut Vec<InternedStr>,
    ) -> bool {
        match expr {
            Expr::Num(_) | Expr::Var(_) => false,
            Expr::Paren(e) | Expr::Unary(_, e) => self.expr_traps(e, macros, stack),
            Expr::Binary(op, lhs, rhs) => {
                let divisor_risky = matches!(op, BinOp::Div | BinOp::Mod)
                    && !matches!(rhs.strip_paren(), Expr::Num(n) if *n != 0 && *n != -1);
                divisor_risky
                    || self.expr_traps(lhs, macros, stack)
                    || self.expr_traps(rhs, macros, stack)
            }
            Expr::Assign(_, e) => self.expr_traps(e, macros, stack),
            Expr::Invocation(name, args) => {
                if args.iter().any(|a| self.expr_traps(a, macros, stack)) {
                    return true;
                }
                self.callee_traps(*name, macros, stack)
            }
        }
    }

    fn callee_traps(
        &self,
        name: InternedStr,
        macros: &MacroView<'a>,
        stack: &mut Vec<InternedStr>,
    ) -> bool {
        if let Some(def) = macros.get(name) {
            return self.expr_traps(&def.body, &macros.hide(name), stack);
        }
        if let Some(func) = self.functions.get(name) {
            // 再帰呼び出しは停止性を証明できない
            if stack.contains(&name) {
                return true;
            }
            stack.push(name);
            let traps = self.stmt_traps(&func.body, macros, stack)
                || self.expr_traps(&func.ret, macros, stack);
            stack.pop();
            return traps;
        }
        true
    }

    fn stmt_traps(
        &self,
        stmt: &Stmt,
        macros: &MacroView<'a>,
        stack: &mut Vec<InternedStr>,
    ) -> bool {
        match stmt {
            Stmt::Skip => false,
            Stmt::Expr(e) => self.expr_traps(e, macros, stack),
            Stmt::IfElse {
                cond,
                then_stmt,
                else_stmt,
            } => {
                self.expr_traps(cond, macros, stack)
                    || self.stmt_traps(then_stmt, macros, stack)
                    || self.stmt_traps(else_stmt, macros, stack)
            }
            Stmt::While { .. } => true,
            Stmt::Compound(stmts) => stmts.iter().any(|s| self.stmt_traps(s, macros, stack)),
        }
    }
}
