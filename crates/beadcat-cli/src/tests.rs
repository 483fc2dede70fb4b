use super::*;

#[test]
fn parses_db_ping_command() {
    let cli = Cli::try_parse_from(["beadcat-cli", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli =
        Cli::try_parse_from(["beadcat-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn parses_db_seed_command() {
    let cli = Cli::try_parse_from(["beadcat-cli", "db", "seed"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Seed
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["beadcat-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn parses_crawlers_command() {
    let cli = Cli::try_parse_from(["beadcat-cli", "crawlers"]).unwrap();
    assert!(matches!(cli.command, Some(Commands::Crawlers)));
}

#[test]
fn crawl_defaults_leave_options_unset() {
    let cli = Cli::try_parse_from(["beadcat-cli", "crawl", "fire_mountain_gems"]).unwrap();
    let Some(Commands::Crawl(args)) = cli.command else {
        panic!("expected crawl command");
    };
    assert_eq!(args.name, "fire_mountain_gems");
    assert!(args.max_pages.is_none());
    assert!(args.export.is_none());
    assert!(!args.cache_responses);
    assert!(!args.details);

    let options = args.options().unwrap();
    assert_eq!(options, beadcat_core::CrawlOptions::default());
}

#[test]
fn crawl_flags_map_to_options() {
    let cli = Cli::try_parse_from([
        "beadcat-cli",
        "crawl",
        "miyuki_wholesale",
        "--max-pages",
        "5",
        "--concurrency",
        "4",
        "--delay",
        "0.5",
        "--cache-responses",
        "--details",
        "--export",
        "out/delicas.json",
    ])
    .unwrap();
    let Some(Commands::Crawl(args)) = cli.command else {
        panic!("expected crawl command");
    };

    let options = args.options().unwrap();
    assert_eq!(options.max_pages, Some(5));
    assert_eq!(options.concurrency, 4);
    assert!((options.delay_seconds - 0.5).abs() < f64::EPSILON);
    assert!(options.cache_responses);
    assert!(options.fetch_details);
    assert_eq!(
        args.export.as_deref(),
        Some(std::path::Path::new("out/delicas.json"))
    );
}

#[test]
fn crawl_rejects_out_of_range_concurrency() {
    let cli = Cli::try_parse_from([
        "beadcat-cli",
        "crawl",
        "fire_mountain_gems",
        "--concurrency",
        "0",
    ])
    .unwrap();
    let Some(Commands::Crawl(args)) = cli.command else {
        panic!("expected crawl command");
    };
    let err = args.options().unwrap_err();
    assert!(err.to_string().contains("concurrency"));
}

#[test]
fn crawl_requires_a_crawler_name() {
    assert!(Cli::try_parse_from(["beadcat-cli", "crawl"]).is_err());
}

#[test]
fn runs_limit_defaults_to_twenty() {
    let cli = Cli::try_parse_from(["beadcat-cli", "runs"]).unwrap();
    assert!(matches!(cli.command, Some(Commands::Runs { limit: 20 })));
}

#[test]
fn unknown_crawler_is_rejected_before_any_work() {
    let cli = Cli::try_parse_from(["beadcat-cli", "crawl", "nonexistent"]).unwrap();
    let Some(Commands::Crawl(args)) = cli.command else {
        panic!("expected crawl command");
    };
    let options = args.options().unwrap();
    let err = beadcat_crawler::request_run(&args.name, options).unwrap_err();
    assert_eq!(err.to_string(), "Unknown crawler: nonexistent");
}

#[test]
fn parses_import_command() {
    let cli = Cli::try_parse_from(["beadcat-cli", "import", "out/delicas.json"]).unwrap();
    let Some(Commands::Import(args)) = cli.command else {
        panic!("expected import command");
    };
    assert_eq!(args.path, std::path::Path::new("out/delicas.json"));
}

#[test]
fn import_requires_a_path() {
    assert!(Cli::try_parse_from(["beadcat-cli", "import"]).is_err());
}
