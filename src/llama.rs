use std::env;

use anyhow::{ensure, Result};
use tokio::process::Command;

pub(crate) async fn generate(model_path: &str, prompt_template: &str, prompt: &str) -> Result<String> {
    let templated_prompt = prompt_template.replace("{prompt}", prompt);
    let output = Command::new("llama")
        .args([
            "--model",
            model_path,
            "--threads",
            &env::var("CHARTWRIGHT_THREADS").unwrap_or("4".to_string()),
            "--ctx-size",
            &env::var("CHARTWRIGHT_CTX_SIZE").unwrap_or("8192".to_string()),
            "--n-predict",
            &env::var("CHARTWRIGHT_N_PREDICT").unwrap_or("800".to_string()),
            "--temp",
            &env::var("CHARTWRIGHT_TEMP").unwrap_or("0.7".to_string()),
            "--repeat-penalty",
            &env::var("CHARTWRIGHT_REPEAT_PENALTY").unwrap_or("1.2".to_string()),
            "--prompt",
            &templated_prompt,
            "--log-disable",
        ])
        .output()
        .await?;
    ensure!(
        output.status.success(),
        "llama exited with {}: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    let completion = String::from_utf8(output.stdout)?
        // TODO: Keep llama from echoing the prompt instead of stripping it here
        .replace(
            // the echoed prompt lacks both BOS and EOS markers
            &templated_prompt.replace("<s>", "").replace("</s>", ""),
            "",
        )
        .trim()
        .to_string();
    return Ok(completion);
}
