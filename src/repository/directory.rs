// ==========================================
// 车辆合规管理系统 - SQLite 目录
// ==========================================
// 职责: 组合各表仓储，实现引擎层 Directory trait
// 说明: 所有仓储共享同一连接（Arc<Mutex<Connection>>）
// ==========================================

use crate::domain::{
    AvailabilityTier, CheckFilter, ComplianceCheck, ComplianceStatus, LoadTier, Station,
    StationRating, Vehicle, VehicleFilter,
};
use crate::engine::collaborators::Directory;
use crate::repository::check_repo::ComplianceCheckRepository;
use crate::repository::error::RepositoryResult;
use crate::repository::rating_repo::StationRatingRepository;
use crate::repository::station_repo::StationRepository;
use crate::repository::vehicle_repo::VehicleRepository;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

pub struct SqliteDirectory {
    vehicles: VehicleRepository,
    stations: StationRepository,
    checks: ComplianceCheckRepository,
    ratings: StationRatingRepository,
}

impl SqliteDirectory {
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            vehicles: VehicleRepository::from_connection(conn.clone()),
            stations: StationRepository::from_connection(conn.clone()),
            checks: ComplianceCheckRepository::from_connection(conn.clone()),
            ratings: StationRatingRepository::from_connection(conn),
        }
    }

    pub fn vehicles(&self) -> &VehicleRepository {
        &self.vehicles
    }

    pub fn stations(&self) -> &StationRepository {
        &self.stations
    }
}

impl Directory for SqliteDirectory {
    fn get_vehicle(&self, vehicle_id: &str) -> RepositoryResult<Option<Vehicle>> {
        self.vehicles.find_by_id(vehicle_id)
    }

    fn list_vehicles(&self, filter: &VehicleFilter) -> RepositoryResult<Vec<Vehicle>> {
        self.vehicles.list(filter)
    }

    fn save_vehicle(&self, vehicle: &Vehicle) -> RepositoryResult<()> {
        self.vehicles.upsert(vehicle)
    }

    fn update_vehicle_status(
        &self,
        vehicle_id: &str,
        expected_expiry: Option<NaiveDate>,
        status: ComplianceStatus,
        at: NaiveDateTime,
    ) -> RepositoryResult<bool> {
        self.vehicles
            .update_status_if_expiry(vehicle_id, expected_expiry, status, at)
    }

    fn delete_vehicle(&self, vehicle_id: &str) -> RepositoryResult<bool> {
        self.vehicles.delete(vehicle_id)
    }

    fn get_station(&self, station_id: &str) -> RepositoryResult<Option<Station>> {
        self.stations.find_by_id(station_id)
    }

    fn list_active_stations(&self) -> RepositoryResult<Vec<Station>> {
        self.stations.list_active()
    }

    fn save_station(&self, station: &Station) -> RepositoryResult<()> {
        self.stations.upsert(station)
    }

    fn update_station_load(&self, station_id: &str, load: LoadTier, at: NaiveDateTime) -> RepositoryResult<bool> {
        self.stations.update_load(station_id, load, at)
    }

    fn update_station_availability(
        &self,
        station_id: &str,
        availability: AvailabilityTier,
        is_open: Option<bool>,
        at: NaiveDateTime,
    ) -> RepositoryResult<bool> {
        self.stations
            .update_availability(station_id, availability, is_open, at)
    }

    fn approve_station(&self, station_id: &str, at: NaiveDateTime, notes: Option<&str>) -> RepositoryResult<bool> {
        self.stations.approve(station_id, at, notes)
    }

    fn save_check(&self, check: &ComplianceCheck) -> RepositoryResult<()> {
        self.checks.insert(check)
    }

    fn list_checks(&self, filter: &CheckFilter) -> RepositoryResult<Vec<ComplianceCheck>> {
        self.checks.list(filter)
    }

    fn save_rating(&self, rating: &StationRating) -> RepositoryResult<()> {
        self.ratings.upsert(rating)
    }

    fn list_ratings(&self, station_id: &str) -> RepositoryResult<Vec<StationRating>> {
        self.ratings.list_by_station(station_id)
    }
}
