//! Default configuration constants.
//!
//! Keeping defaults in one module lets the typed config, the loader and the
//! tests share the same literals.

/// Directory scanned for the most recent run when no model dir is configured.
pub(super) const DEFAULT_CHECKPOINTS_ROOT: &str = "./checkpoints";
/// Program and leading arguments of the external model capability.
pub(super) const DEFAULT_MODEL_COMMAND: &[&str] = &["python3", "-m", "conversational_ai.t5_model"];
/// Argument templates binding the inference run to one request.
pub(super) const DEFAULT_MODEL_ARGS: &[&str] = &[
    "--gin_param=utils.run.mode = 'infer'",
    "--gin_param=utils.run.model_dir = '{model_dir}'",
    "--gin_param=utils.run.eval_checkpoint_step = {step}",
    "--gin_param=infer_model.input_filename = '{input}'",
    "--gin_param=infer_model.output_filename = '{output}'",
    "--gin_param=Bitransformer.decode.temperature = {temperature}",
];
/// Silences TensorFlow's C++ logging in the model process.
pub(super) const DEFAULT_MODEL_ENV: &[(&str, &str)] = &[("TF_CPP_MIN_LOG_LEVEL", "3")];
pub(super) const DEFAULT_TEMPERATURE: f64 = 0.0;
pub(super) const DEFAULT_NUM_SAMPLES: u32 = 1;

pub(super) const DEFAULT_TASK_PREFIX: &str = "converse: ";
pub(super) const DEFAULT_TURN_PREFIXES: [&str; 2] = ["human> ", "model> "];
/// Joins turns on one request line; the model was trained on tab-separated turns.
pub(super) const DEFAULT_TURN_SEPARATOR: &str = "\t";
/// Number of trailing turns included in each prompt.
pub(super) const DEFAULT_CONTEXT_WINDOW: usize = 100;
pub(super) const DEFAULT_INPUT_PROMPT: &str = "> ";

pub(super) const DEFAULT_CHATS_DIR: &str = "./chats";
pub(super) const DEFAULT_TRANSCRIPT_FILE: &str = "chat_{timestamp}.txt";
pub(super) const DEFAULT_CONFIG_LOG_FILE: &str = "chat_{timestamp}.toml";
pub(super) const DEFAULT_TURN_LABELS: [&str; 2] = ["human: ", "model: "];
/// Fixed offset for session timestamps; hosts run in arbitrary timezones.
pub(super) const DEFAULT_UTC_OFFSET_HOURS: i32 = -6;

pub(super) const DEFAULT_LOG_LEVEL: &str = "warn";
