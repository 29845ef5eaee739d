fn main() -> std::process::ExitCode {
    jira_weekly_lib::run()
}
