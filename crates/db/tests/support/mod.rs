#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use honey_core::ObjectLocation;
use honey_db::{Db, WarehouseConfig, WarehouseQueryService};
use tempfile::TempDir;

pub const DATABASE: &str = "honey";
pub const TABLE: &str = "rotations";

pub struct TestDb {
    pub _dir: TempDir,
    pub db: Db,
    pub path: PathBuf,
}

pub fn setup_db() -> TestDb {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("test.sqlite");
    let mut db = Db::open(&path).expect("open db");
    db.migrate().expect("migrate db");
    TestDb {
        _dir: dir,
        db,
        path,
    }
}

pub struct TestWarehouse {
    pub dir: TempDir,
    pub service: WarehouseQueryService,
}

impl TestWarehouse {
    pub fn store_root(&self) -> PathBuf {
        self.dir.path().join("store")
    }

    pub fn table_root(&self) -> PathBuf {
        self.service
            .config()
            .table_location
            .to_path(&self.store_root())
    }

    pub fn result_path(&self, execution_id: &str) -> PathBuf {
        self.service
            .config()
            .results_location
            .join(&format!("{execution_id}.csv"))
            .to_path(&self.store_root())
    }
}

pub fn setup_warehouse() -> TestWarehouse {
    let dir = tempfile::tempdir().expect("temp dir");
    let config = WarehouseConfig {
        db_path: dir.path().join("warehouse/honey.sqlite"),
        database: DATABASE.to_string(),
        table: TABLE.to_string(),
        store_root: dir.path().join("store"),
        table_location: ObjectLocation::parse("s3://honey-data/rotations").expect("table"),
        results_location: ObjectLocation::parse("s3://honey-results/athena").expect("results"),
    };
    let service = WarehouseQueryService::open(config).expect("open warehouse");
    TestWarehouse { dir, service }
}

pub fn write_partition_file(table_root: &Path, relative: &str, contents: &str) -> PathBuf {
    let path = table_root.join(relative);
    fs::create_dir_all(path.parent().expect("parent")).expect("create partition dir");
    fs::write(&path, contents).expect("write partition file");
    path
}
