use message_templates_lib::settings::config_from_env;
use message_templates_lib::{GenerationParams, MessageLength, MessageTemplateGenerator, Tone};

const USAGE: &str = "usage: message-templates [--formal] [--short|--long] \
[--placeholders name,discount] [--audience TEXT] PROMPT...";

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<GenerationParams, String> {
    let mut params = GenerationParams::default();
    let mut prompt = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--formal" => params.tone = Tone::Formal,
            "--informal" => params.tone = Tone::Informal,
            "--short" => params.length = MessageLength::Short,
            "--medium" => params.length = MessageLength::Medium,
            "--long" => params.length = MessageLength::Long,
            "--placeholders" => {
                let list = args.next().ok_or("--placeholders needs a value")?;
                params.placeholders = list.split(',').map(|p| p.trim().to_string()).collect();
            }
            "--audience" => {
                params.audience = Some(args.next().ok_or("--audience needs a value")?);
            }
            "-h" | "--help" => return Err(USAGE.to_string()),
            _ => prompt.push(arg),
        }
    }

    params.prompt = prompt.join(" ");
    Ok(params)
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let params = match parse_args(std::env::args().skip(1)) {
        Ok(params) => params,
        Err(message) => {
            eprintln!("{}", message);
            std::process::exit(2);
        }
    };

    let config = match config_from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("message-templates failed to start: {}", e);
            std::process::exit(1);
        }
    };

    let mut generator = match MessageTemplateGenerator::new(config) {
        Ok(generator) => generator,
        Err(e) => {
            eprintln!("message-templates failed to start: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = generator.initialize().await {
        eprintln!("message-templates failed to start: {}", e);
        std::process::exit(1);
    }

    let result = generator.generate(params).await;
    generator.cleanup().await;

    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize result: {}", e),
    }

    if !result.success {
        std::process::exit(1);
    }
}
