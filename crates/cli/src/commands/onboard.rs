//! `ojisan onboard` — First-time setup.

use ojisan_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("📱 ojisan — First-Time Setup");
    println!("============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
        println!("\n📝 Next steps:");
        println!("   1. Edit {} and point backend.base_url at your", config_path.display());
        println!("      OpenAI-compatible server (vLLM, Ollama, llama.cpp, ...)");
        println!("   2. Run: ojisan chat");
        println!("   3. おはよう！と打ってみてください\n");
    }

    println!("🎉 Setup complete! Run `ojisan chat` to start.\n");

    Ok(())
}
