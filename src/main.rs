//! macro2fn CLI
//!
//! フロントエンドが書き出したプログラム記述（JSON）を読み、変換
//! パスを実行してレポートを出力する。

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::Parser;
use macro2fn::{render_function, Engine, EngineConfig, Program};

/// コマンドライン引数
#[derive(Parser)]
#[command(name = "macro2fn")]
#[command(version, about = "Transform C macros into equivalent functions where provably safe")]
struct Cli {
    /// 入力プログラム記述 (JSON)
    input: PathBuf,

    /// 出力ファイル（省略時は標準出力）
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// レポートをJSONで出力（デフォルトは行形式）
    #[arg(long = "json")]
    json: bool,

    /// 生成した関数定義をCテキストで出力（レポートの代わり）
    #[arg(long = "emit-functions")]
    emit_functions: bool,

    /// 統計情報を標準エラーに表示
    #[arg(long = "dump-stats")]
    dump_stats: bool,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut program = Program::from_path(&cli.input)?;
    let engine = Engine::with_config(EngineConfig::default());
    let outcome = engine.run(&mut program)?;

    let mut out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };

    if cli.emit_functions {
        for func in program.functions.generated() {
            writeln!(out, "{}", render_function(func, &program.interner))?;
        }
    } else if cli.json {
        writeln!(out, "{}", outcome.reporter.to_json()?)?;
    } else {
        outcome.reporter.write_lines(&mut out)?;
    }
    out.flush()?;

    if cli.dump_stats {
        eprint!("{}", outcome.stats.dump_stats());
    }

    Ok(())
}
