//! 変換パスの駆動
//!
//! 解析 → 判定 → 生成 → 報告 をマクロ展開サイトごとに直列に実行
//! する。サイトは入力順に処理しなければならない。後続サイトの判定は
//! 先行サイトが登録した関数定義を見る必要があるため、並べ替えや
//! 並行実行はできない。パス全体は有限ASTの構造的再帰だけで構成され、
//! 必ず停止する。

use crate::ast::Expr;
use crate::codegen::{definition_hash, render_signature, CodeGen, ShapeKey};
use crate::error::{ContractError, Result};
use crate::input::Program;
use crate::intern::InternedStr;
use crate::report::Reporter;
use crate::scope::ScopeShape;
use crate::transform::{decide, RejectReason, Verdict};

/// エンジン設定
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 生成関数名の接尾辞
    pub fn_suffix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fn_suffix: "_fn".to_string(),
        }
    }
}

/// 1サイト分の変換結果
#[derive(Debug, Clone)]
pub struct SiteResult {
    /// `Program::sites` 内の添字
    pub site_index: usize,
    /// 判定
    pub verdict: Verdict,
    /// 書き換え後の呼び出し式（Transformable の場合のみ）
    pub rewritten: Option<Expr>,
    /// 生成（または再利用）された関数
    pub generated: Option<(ShapeKey, InternedStr)>,
}

/// 統計情報
#[derive(Debug, Clone, Default)]
pub struct TransformStats {
    /// 観測したマクロ定義数
    pub macros_seen: usize,
    /// 観測した展開サイト数
    pub sites_seen: usize,
    /// 変換したサイト数
    pub transformed: usize,
    /// 生成した関数定義数
    pub definitions_emitted: usize,
    /// 重複排除で再利用した回数
    pub dedup_reuses: usize,
    /// 棄却: 引数個数不一致
    pub arity_mismatch: usize,
    /// 棄却: パラメータ名重複
    pub malformed_macro: usize,
    /// 棄却: ネストしたマクロ
    pub nested_macro: usize,
    /// 棄却: ローカル捕捉
    pub captures_caller_scope: usize,
    /// 棄却: 先行評価できない引数
    pub unsafe_argument: usize,
    /// 棄却: 副作用のある本体
    pub side_effecting_body: usize,
}

impl TransformStats {
    fn count_reject(&mut self, reason: RejectReason) {
        match reason {
            RejectReason::ArityMismatch => self.arity_mismatch += 1,
            RejectReason::MalformedMacro => self.malformed_macro += 1,
            RejectReason::NestedMacro => self.nested_macro += 1,
            RejectReason::CapturesCallerScope => self.captures_caller_scope += 1,
            RejectReason::UnsafeArgument => self.unsafe_argument += 1,
            RejectReason::SideEffectingBody => self.side_effecting_body += 1,
        }
    }

    /// 棄却されたサイト数
    pub fn untransformed(&self) -> usize {
        self.arity_mismatch
            + self.malformed_macro
            + self.nested_macro
            + self.captures_caller_scope
            + self.unsafe_argument
            + self.side_effecting_body
    }

    /// 統計情報をダンプ
    pub fn dump_stats(&self) -> String {
        format!(
            "=== Transform Stats ===\n\
             Macro definitions: {}\n\
             Expansion sites: {}\n\
             Transformed: {}\n\
             Untransformed: {}\n\
               arity mismatch: {}\n\
               malformed macro: {}\n\
               nested macro: {}\n\
               captures caller scope: {}\n\
               unsafe argument: {}\n\
               side-effecting body: {}\n\
             Definitions emitted: {}\n\
             Dedup reuses: {}\n",
            self.macros_seen,
            self.sites_seen,
            self.transformed,
            self.untransformed(),
            self.arity_mismatch,
            self.malformed_macro,
            self.nested_macro,
            self.captures_caller_scope,
            self.unsafe_argument,
            self.side_effecting_body,
            self.definitions_emitted,
            self.dedup_reuses,
        )
    }
}

/// 変換パス全体の結果
#[derive(Debug)]
pub struct TransformOutcome {
    /// サイトごとの結果（入力順）
    pub results: Vec<SiteResult>,
    /// 統計
    pub stats: TransformStats,
    /// レポート
    pub reporter: Reporter,
}

/// 変換エンジン
#[derive(Debug, Default)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    /// デフォルト設定のエンジンを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 設定を指定して作成
    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    /// プログラム全体に変換パスを1回適用する
    ///
    /// 成功時、`program.functions` には生成関数が追加されている。
    /// マクロテーブルは変更されない。マクロテーブルに無いマクロの
    /// 展開サイトを見つけた場合は契約違反としてエラーを返す。
    pub fn run(&self, program: &mut Program) -> Result<TransformOutcome> {
        let Program {
            interner,
            files,
            macros,
            functions,
            globals,
            sites,
        } = program;

        let mut reporter = Reporter::new();
        let mut stats = TransformStats::default();
        let mut codegen = CodeGen::with_suffix(&self.config.fn_suffix);
        let mut results = Vec::with_capacity(sites.len());

        // マクロ定義の観測レコード。テーブルの列挙順は不定なので、
        // 名前順に並べて決定的にする。
        let mut defs: Vec<_> = macros.iter().map(|(_, def)| def).collect();
        defs.sort_by_key(|def| interner.get(def.name));
        stats.macros_seen = defs.len();
        for def in defs {
            reporter.macro_definition(
                definition_hash(def, interner),
                def.def_loc.render(files),
            );
        }

        for (site_index, site) in sites.iter().enumerate() {
            let Some(def) = macros.get(site.macro_name) else {
                return Err(ContractError::UndefinedMacro {
                    name: interner.get(site.macro_name).to_string(),
                    loc: site.loc.clone(),
                }
                .into());
            };

            let dhash = definition_hash(def, interner);
            reporter.macro_expansion(dhash, site.loc.render(files));
            stats.sites_seen += 1;

            let scope = ScopeShape::new(site.locals.iter().copied(), globals.iter().copied());
            let verdict = decide(def, &site.args, &scope, functions, macros);

            match verdict {
                Verdict::Transformable(strategy) => {
                    let realized = codegen.realize(def, strategy, functions, interner);
                    if realized.created {
                        if let Some(func) = functions.get(realized.name) {
                            reporter.transformed_definition(
                                dhash,
                                render_signature(func, interner),
                                interner.get(realized.name).to_string(),
                            );
                        }
                        stats.definitions_emitted += 1;
                    } else {
                        stats.dedup_reuses += 1;
                    }

                    reporter.transformed_expansion(
                        dhash,
                        site.loc.render(files),
                        interner.get(site.enclosing).to_string(),
                        interner.get(realized.name).to_string(),
                    );
                    stats.transformed += 1;

                    results.push(SiteResult {
                        site_index,
                        verdict,
                        rewritten: Some(CodeGen::rewrite_site(realized.name, &site.args)),
                        generated: Some((realized.key, realized.name)),
                    });
                }
                Verdict::NotTransformable(reason) => {
                    reporter.untransformed_expansion(
                        dhash,
                        site.loc.render(files),
                        interner.get(site.enclosing).to_string(),
                        reason.category(),
                        reason.code(),
                    );
                    stats.count_reject(reason);

                    results.push(SiteResult {
                        site_index,
                        verdict,
                        rewritten: None,
                        generated: None,
                    });
                }
            }
        }

        Ok(TransformOutcome {
            results,
            stats,
            reporter,
        })
    }
}
