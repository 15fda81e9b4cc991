//! 識別子インターナー
//!
//! マクロ名・関数名・変数名はすべてここでインターンされ、以降は
//! u32 の比較だけで同一性を判定できる。インターン済みの名前全体は
//! 「その時点で可視な識別子の集合」の保守的な近似でもあるため、
//! 生成関数の衝突しない命名（`fresh`）にも使う。

use std::collections::HashMap;

/// インターン済み識別子
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, Default, PartialOrd, Ord)]
pub struct InternedStr(u32);

impl InternedStr {
    /// 内部IDを取得（デバッグ用）
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// 識別子インターナー
#[derive(Clone, Debug, Default)]
pub struct StringInterner {
    strings: Vec<String>,
    map: HashMap<String, InternedStr>,
}

impl StringInterner {
    /// 新しいインターナーを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 識別子をインターンし、IDを返す
    pub fn intern(&mut self, s: &str) -> InternedStr {
        if let Some(&id) = self.map.get(s) {
            return id;
        }
        let id = InternedStr(self.strings.len() as u32);
        self.strings.push(s.to_owned());
        self.map.insert(s.to_owned(), id);
        id
    }

    /// IDから識別子を取得
    pub fn get(&self, id: InternedStr) -> &str {
        &self.strings[id.0 as usize]
    }

    /// インターン済みか検索（新規登録しない）
    pub fn lookup(&self, s: &str) -> Option<InternedStr> {
        self.map.get(s).copied()
    }

    /// どの既知識別子とも衝突しない新しい名前を確保する
    ///
    /// `base` そのものが未使用ならそれを、使用済みなら `base_1`,
    /// `base_2`, ... を順に試す。当選した名前はその場でインターン
    /// されるので、以降の `fresh` 呼び出しとも衝突しない。
    pub fn fresh(&mut self, base: &str) -> InternedStr {
        if self.lookup(base).is_none() {
            return self.intern(base);
        }
        let mut n = 1usize;
        loop {
            let candidate = format!("{}_{}", base, n);
            if self.lookup(&candidate).is_none() {
                return self.intern(&candidate);
            }
            n += 1;
        }
    }

    /// インターン済み識別子の数
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// インターナーが空かどうか
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}
