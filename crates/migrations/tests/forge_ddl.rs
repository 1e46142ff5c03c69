use elif_migrations::{
    ConnectionSettings, DatabaseDriver, Field, Forge, MemoryDriver, MigrationError, SqlDialect,
};

#[tokio::test]
async fn widgets_table_has_auto_increment_id_and_named_primary_key() {
    for dialect in [SqlDialect::PostgreSQL, SqlDialect::MySQL, SqlDialect::SqlServer] {
        let driver = MemoryDriver::new(dialect);
        let mut forge = Forge::new(&driver);
        forge
            .add_field("id", Field::new("INT").constraint(9).auto_increment())
            .unwrap()
            .add_primary_key(&["id"]);

        assert!(forge.create_table("widgets", false, &[]).await.unwrap());

        let sql = &driver.executed()[0];
        let (open, close) = dialect.identifier_quotes();
        assert!(sql.starts_with(&format!("CREATE TABLE {o}widgets{c}", o = open, c = close)), "{}", sql);
        assert!(
            sql.contains(&format!("CONSTRAINT {o}pk_widgets{c} PRIMARY KEY({o}id{c})", o = open, c = close)),
            "{}",
            sql
        );
        let auto_increment = match dialect {
            SqlDialect::PostgreSQL => "SERIAL",
            SqlDialect::MySQL => "AUTO_INCREMENT",
            _ => "IDENTITY(1,1)",
        };
        assert!(sql.contains(auto_increment), "{}", sql);
        assert!(driver.has_table("widgets"));
    }
}

#[tokio::test]
async fn usage_and_schema_errors() {
    let driver = MemoryDriver::new(SqlDialect::MySQL);
    let mut forge = Forge::new(&driver);

    assert!(matches!(
        forge.add_foreign_key("user_id", "users", "id", "CASCADE", "CASCADE"),
        Err(MigrationError::Schema(_))
    ));
    assert!(matches!(
        forge.create_table("widgets", false, &[]).await,
        Err(MigrationError::Usage(_))
    ));
    assert!(matches!(forge.add_field_str("bad"), Err(MigrationError::Usage(_))));
    assert!(matches!(
        forge.drop_table("", false, false).await,
        Err(MigrationError::Usage(_))
    ));
    assert!(driver.executed().is_empty());
}

#[tokio::test]
async fn prefix_applies_to_tables_indexes_and_foreign_key_targets() {
    let driver = MemoryDriver::new(SqlDialect::SQLite)
        .with_settings(ConnectionSettings::default().with_prefix("blog_"));
    let mut forge = Forge::new(&driver);
    forge
        .add_field_str("id")
        .unwrap()
        .add_field("author_id", Field::new("INTEGER"))
        .unwrap()
        .add_field("slug", Field::new("VARCHAR").constraint(120))
        .unwrap()
        .add_unique_key(&["slug"])
        .add_foreign_key("author_id", "users", "id", "", "SET NULL")
        .unwrap();

    assert!(forge.create_table("posts", true, &[]).await.unwrap());

    let executed = driver.executed();
    assert_eq!(executed.len(), 2);
    assert!(executed[0].starts_with("CREATE TABLE IF NOT EXISTS \"blog_posts\""));
    assert!(executed[0].contains("\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"));
    assert!(!executed[0].contains("pk_blog_posts"));
    assert!(executed[0].contains(
        "CONSTRAINT \"blog_posts_author_id_foreign\" FOREIGN KEY(\"author_id\") REFERENCES \"blog_users\" (\"id\") ON DELETE SET NULL"
    ));
    assert_eq!(
        executed[1],
        "CREATE UNIQUE INDEX \"blog_posts_slug\" ON \"blog_posts\" (\"slug\")"
    );
    assert!(driver.has_table("posts"));
}

#[tokio::test]
async fn drop_table_always_pairs_foreign_key_toggles() {
    let driver = MemoryDriver::new(SqlDialect::PostgreSQL);
    driver.add_table("posts");
    let mut forge = Forge::new(&driver);

    assert!(forge.drop_table("posts", false, true).await.unwrap());
    assert_eq!(driver.foreign_key_toggles(), (1, 1));

    driver.fail_on("DROP TABLE");
    assert!(forge.drop_table("posts", false, false).await.is_err());
    assert_eq!(driver.foreign_key_toggles(), (2, 2));

    let mut lenient = Forge::new(&driver).lenient();
    assert!(!lenient.drop_table("posts", false, false).await.unwrap());
    assert_eq!(driver.foreign_key_toggles(), (3, 3));
}

#[tokio::test]
async fn sqlserver_emulates_if_not_exists_and_renames_with_sp_rename() {
    let driver = MemoryDriver::new(SqlDialect::SqlServer);
    let mut forge = Forge::new(&driver);

    forge.add_field_str("id").unwrap();
    assert!(forge.create_table("jobs", true, &[]).await.unwrap());
    assert!(driver.executed()[0].starts_with("CREATE TABLE [jobs]"));

    forge.add_field_str("id").unwrap();
    assert!(forge.create_table("jobs", true, &[]).await.unwrap());
    assert_eq!(driver.executed().len(), 1);

    assert!(forge.rename_table("jobs", "queued_jobs").await.unwrap());
    assert_eq!(driver.executed()[1], "EXEC sp_rename 'jobs', 'queued_jobs'");

    forge
        .modify_column("jobs", vec![("payload", Field::new("TEXT").nullable(true).rename_to("body"))])
        .await
        .unwrap();
    assert_eq!(
        &driver.executed()[2..],
        [
            "ALTER TABLE [jobs] ALTER COLUMN [payload] VARCHAR(MAX) NULL".to_string(),
            "EXEC sp_rename 'jobs.payload', 'body', 'COLUMN'".to_string(),
        ]
    );
}

#[tokio::test]
async fn mysql_column_changes_and_foreign_key_drop() {
    let driver = MemoryDriver::new(SqlDialect::MySQL);
    let mut forge = Forge::new(&driver);

    forge
        .add_column("users", vec![("age", Field::new("TINYINT").constraint(3).unsigned().default(0i64))])
        .await
        .unwrap();
    forge
        .modify_column("users", vec![("name", Field::new("VARCHAR").constraint(200).rename_to("full_name"))])
        .await
        .unwrap();
    let constraint = forge.foreign_key_name("posts", "user_id");
    forge.drop_foreign_key("posts", &constraint).await.unwrap();

    assert_eq!(
        driver.executed(),
        vec![
            "ALTER TABLE `users` ADD `age` TINYINT(3) UNSIGNED DEFAULT 0".to_string(),
            "ALTER TABLE `users` CHANGE `name` `full_name` VARCHAR(200)".to_string(),
            "ALTER TABLE `posts` DROP FOREIGN KEY `posts_user_id_foreign`".to_string(),
        ]
    );
}

#[tokio::test]
async fn unavailable_features_error_or_return_false() {
    let driver = MemoryDriver::new(SqlDialect::SQLite);

    let mut strict = Forge::new(&driver);
    assert!(matches!(
        strict.drop_foreign_key("posts", "posts_user_id_foreign").await,
        Err(MigrationError::FeatureUnavailable(_))
    ));

    let mut lenient = Forge::new(&driver).lenient();
    assert!(!lenient.drop_foreign_key("posts", "posts_user_id_foreign").await.unwrap());
    assert!(!lenient.create_database("app", false).await.unwrap());
    assert!(driver.executed().is_empty());
    assert_eq!(driver.dialect(), SqlDialect::SQLite);
}
