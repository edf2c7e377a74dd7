// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 视频文件检测回放
/// 主程序入口 - 直接运行: cargo run --bin player --release
use clap::Parser;
use macroquad::prelude::*;
use yolov8_player::{Args, Player, VideoSource, YOLOv8};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn window_conf() -> Conf {
    Conf {
        window_title: "YOLOv8 视频检测回放".to_owned(),
        window_width: 1280,
        window_height: 720,
        window_resizable: true,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if let Err(err) = run().await {
        eprintln!("❌ {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    args.validate()?;

    println!("📦 检测模型: {}", args.model);
    let model = YOLOv8::new(&args)?;
    model.summary();

    let source = VideoSource::open(&args.video)?;

    println!("⌨️  按键: [+/-] 调速  [Q/Esc] 退出\n");
    let mut player = Player::new(model, source, args.speed);
    player.run().await
}
