use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        PossibleValuesParser, ValueParser,
    },
    Arg, ColorChoice, Command,
};

pub const ARG_VERBOSITY: &str = "verbosity";

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("taskwave")
        .about("Referral-aware account registration and sign-in")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("TASKWAVE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("backend")
                .long("backend")
                .help("Account directory backend")
                .default_value("firebase")
                .env("TASKWAVE_BACKEND")
                .value_parser(PossibleValuesParser::new(["firebase", "memory"])),
        )
        .arg(
            Arg::new("api-key")
                .long("api-key")
                .help("Web API key of the hosted backend")
                .env("TASKWAVE_API_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new("project-id")
                .long("project-id")
                .help("Project holding the users collection and settings")
                .env("TASKWAVE_PROJECT_ID"),
        )
        .arg(
            Arg::new("auth-url")
                .long("auth-url")
                .help("Credential service base URL")
                .default_value("https://identitytoolkit.googleapis.com/v1")
                .env("TASKWAVE_AUTH_URL"),
        )
        .arg(
            Arg::new("firestore-url")
                .long("firestore-url")
                .help("Record store base URL")
                .default_value("https://firestore.googleapis.com/v1")
                .env("TASKWAVE_FIRESTORE_URL"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .help("Backend request timeout in seconds")
                .default_value("10")
                .env("TASKWAVE_TIMEOUT")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("min-password-length")
                .long("min-password-length")
                .help("Minimum signup password length")
                .default_value("8")
                .env("TASKWAVE_MIN_PASSWORD_LENGTH")
                .value_parser(clap::value_parser!(u16).range(1..)),
        )
        .arg(
            Arg::new("dashboard-url")
                .long("dashboard-url")
                .help("Where users land after signing up or signing in")
                .default_value("dashboard.html")
                .env("TASKWAVE_DASHBOARD_URL"),
        )
        .arg(
            Arg::new("frontend-origin")
                .long("frontend-origin")
                .help("Origin of the sign-in page, allowed by CORS, example: https://app.taskwave.dev")
                .env("TASKWAVE_FRONTEND_ORIGIN"),
        )
        .arg(
            Arg::new(ARG_VERBOSITY)
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("TASKWAVE_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}
