//! `init` command implementation.
//!
//! Scaffolds a starter `ares.toml` and `.env.example` for a new deployment.

use super::output::Output;
use std::fs;
use std::path::Path;

/// Result of the init operation
pub enum InitResult {
    /// Initialization completed successfully
    Success,
    /// Project already exists (ares.toml found)
    AlreadyExists,
    /// An error occurred during initialization
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to initialize
    pub path: std::path::PathBuf,
    /// Overwrite existing files
    pub force: bool,
    /// Host address for the server
    pub host: String,
    /// Port for the server
    pub port: u16,
}

/// Run the init command
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing project");

    let base_path = &config.path;
    let config_path = base_path.join("ares.toml");
    if config_path.exists() && !config.force {
        output.warning("ares.toml already exists!");
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    for dir in ["data", "data/blobs", "data/search"] {
        let dir_path = base_path.join(dir);
        if !dir_path.exists() {
            if let Err(e) = fs::create_dir_all(&dir_path) {
                output.error_msg(&format!("failed to create {}: {}", dir, e));
                return InitResult::Error(e.to_string());
            }
            output.created("directory", dir);
        } else {
            output.skipped(dir, "already exists");
        }
    }

    let toml_content = generate_ares_toml(&config);
    if let Err(e) = write_file(&config_path, &toml_content, config.force) {
        output.error_msg(&format!("failed to create ares.toml: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("config", "ares.toml");

    let env_path = base_path.join(".env.example");
    if let Err(e) = write_file(&env_path, ENV_EXAMPLE, config.force) {
        output.error_msg(&format!("failed to create .env.example: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("env", ".env.example");

    let gitignore_path = base_path.join(".gitignore");
    if !gitignore_path.exists() {
        if write_file(&gitignore_path, GITIGNORE, false).is_ok() {
            output.created("file", ".gitignore");
        }
    }

    output.header("Next steps");
    output.info("1. Set up environment variables:");
    output.command("cp .env.example .env");
    output.command("# edit .env and set JWT_SECRET (min 32 chars)");
    output.newline();
    output.info("2. Start Ollama (if using the default local provider):");
    output.command("ollama serve");
    output.command("ollama pull nomic-embed-text");
    output.newline();
    output.info("3. Start the server:");
    output.command("retrieva-server");
    output.newline();
    output.hint(&format!("Server will be available at http://{}:{}", config.host, config.port));

    InitResult::Success
}

fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<()> {
    if path.exists() && !force {
        return Ok(());
    }
    fs::write(path, content)
}

fn generate_ares_toml(config: &InitConfig) -> String {
    format!(
        r#"# retrieva configuration
# Generated by: retrieva-server init
#
# REQUIRED: set JWT_SECRET (min 32 characters) in the environment before starting.
#
# Hot reloading: changes to this file are detected and applied without a restart.

[server]
host = "{host}"
port = {port}
log_level = "info"

[auth]
jwt_secret_env = "JWT_SECRET"
jwt_access_expiry = 900
jwt_refresh_expiry = 604800
api_key_env = "API_KEY"

[database]
url = "./data/ares.db"

[providers.ollama-local]
type = "ollama"
base_url = "http://localhost:11434"
default_model = "llama3.1:8b"

[models.default]
provider = "ollama-local"
model = "llama3.1:8b"
temperature = 0.3
max_tokens = 1024

[rag]
embedding_model = "BAAI/bge-small-en-v1.5"
chunk_size = 2500
chunk_overlap = 250
text_dim = 384
image_dim = 768

[retrieval]
backend = "searchindex"
hybrid_mmr_enable = false
hybrid_mmr_lambda = 0.5

[cache]
ttl_semantic = 300
ttl_llm = 900
failure_threshold = 5
cooldown = 60

[deep_research]
t_total_seconds = 120
top_k_local = 8
top_k_web = 6
retry_loops = 1
missing_concept_loops = 1
h_min = 3
d_min = 2

[web]
provider = "none"

[blob_store]
root_dir = "./data/blobs"
"#,
        host = config.host,
        port = config.port,
    )
}

const ENV_EXAMPLE: &str = r#"# retrieva environment variables
# Copy this file to .env and fill in the values.

# REQUIRED: JWT secret for authentication (minimum 32 characters)
# Generate with: openssl rand -base64 32
JWT_SECRET=change-me-in-production-use-at-least-32-characters

# Optional: API key for service-to-service authentication
API_KEY=your-api-key-here

# Optional: logging level (trace, debug, info, warn, error)
RUST_LOG=info,retrieva=debug

# Optional: OpenAI-compatible API key, if using that provider
# OPENAI_API_KEY=sk-...

# Optional: Turso cloud database, if using a remote MetaStore
# TURSO_URL=libsql://your-db.turso.io
# TURSO_AUTH_TOKEN=your-token
"#;

const GITIGNORE: &str = r#"/data/
*.db
*.db-journal

.env
.env.local
.env.*.local

/target/
Cargo.lock

.idea/
.vscode/
*.swp
*.swo
*~

.DS_Store
Thumbs.db
"#;
