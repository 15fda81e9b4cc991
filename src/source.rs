//! ソース位置
//!
//! 位置情報はフロントエンドが報告したものをそのまま保持するだけで、
//! 本エンジンがファイルを開くことはない。パス文字列は `FileRegistry`
//! でインターンし、レコード出力時に解決する。

use std::collections::HashMap;

/// ファイル識別子
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub struct FileId(u32);

impl FileId {
    /// 内部IDを取得（デバッグ用）
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// ソース位置
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceLocation {
    pub file_id: FileId,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    /// 新しいソース位置を作成
    pub fn new(file_id: FileId, line: u32, column: u32) -> Self {
        Self {
            file_id,
            line,
            column,
        }
    }

    /// `path:line:col` 形式で描画
    pub fn render(&self, files: &FileRegistry) -> String {
        format!("{}:{}:{}", files.path_of(self.file_id), self.line, self.column)
    }
}

/// ファイルレジストリ
#[derive(Debug, Default, Clone)]
pub struct FileRegistry {
    paths: Vec<String>,
    ids: HashMap<String, FileId>,
}

impl FileRegistry {
    /// 新しいレジストリを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// パスを登録してIDを返す（登録済みなら既存ID）
    pub fn register(&mut self, path: &str) -> FileId {
        if let Some(&id) = self.ids.get(path) {
            return id;
        }
        let id = FileId(self.paths.len() as u32);
        self.ids.insert(path.to_owned(), id);
        self.paths.push(path.to_owned());
        id
    }

    /// IDからパスを取得
    pub fn path_of(&self, id: FileId) -> &str {
        &self.paths[id.0 as usize]
    }

    /// 登録されているファイル数
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// レジストリが空かどうか
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
