// Copyright (c) Meta Platforms, Inc. and affiliates.

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! # Pool and App Requests
//!
//! Builders for the bodies of `POST /pools`, `PUT /pools/{id}`, `POST /apps`
//! and `PUT /apps/{id}`. Every builder validates operator input first and
//! refuses to produce a body the backend would have to reject.
//!
//! Cache allocation edits go through [`CbmEdit`], which expands a pool's CBM
//! fields into one Bitmask, or two when CDP splits code and data:
//!
//!```
//!     use rdt_utils::{CacheAllocation, CacheLevel, CbmEdit, Pool, PoolUpdate};
//!     let l3cat = CacheAllocation { cw_num: 12, ..Default::default() };
//!     let pool = Pool { id: 1, l3cbm: Some(0xfff), ..Default::default() };
//!
//!     let mut edit = CbmEdit::from_pool(&pool, CacheLevel::L3, &l3cat).unwrap().unwrap();
//!     edit.toggle(0);
//!     let body = PoolUpdate::default().with_cbm(CacheLevel::L3, &edit, 12).unwrap();
//!     assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"l3cbm":2047}"#);
//!```

use crate::bitmask::full_cbm;
use crate::bitmask::Bitmask;
use crate::caps::CacheAllocation;
use crate::caps::Capability;
use crate::caps::Caps;
use crate::caps::Pool;
use crate::config::Config;
use crate::config::MBA_BW_UNLIMITED;
use crate::error::CodecError;
use crate::rangelist::RangeList;
use crate::validate::parse_validated;
use crate::validate::validate_mba_bw;
use crate::validate::validate_mba_percent;
use crate::validate::validate_name;
use crate::validate::Constraints;
use anyhow::bail;
use anyhow::Result;
use log::debug;
use serde::Serialize;

/// MBA percentage a new pool starts with.
pub const MBA_DEFAULT_PERCENT: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLevel {
    L3,
    L2,
}

/// CBM fields of one cache level, laid out the way the backend names them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct CbmFields {
    shared: Option<u64>,
    code: Option<u64>,
    data: Option<u64>,
}

impl CbmFields {
    fn new(cdp: bool, cbm: u64) -> Self {
        if cdp {
            Self {
                shared: None,
                code: Some(cbm),
                data: Some(cbm),
            }
        } else {
            Self {
                shared: Some(cbm),
                code: None,
                data: None,
            }
        }
    }
}

/// Editable CBMs of one pool at one cache level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CbmEdit {
    Shared(Bitmask),
    Cdp { code: Bitmask, data: Bitmask },
}

impl CbmEdit {
    /// Expand the CBMs `pool` holds at `level`. Returns None when the pool
    /// carries no CBM for the mode `cat` reports.
    pub fn from_pool(
        pool: &Pool,
        level: CacheLevel,
        cat: &CacheAllocation,
    ) -> std::result::Result<Option<CbmEdit>, CodecError> {
        let (shared, code, data) = match level {
            CacheLevel::L3 => (pool.l3cbm, pool.l3cbm_code, pool.l3cbm_data),
            CacheLevel::L2 => (pool.l2cbm, pool.l2cbm_code, pool.l2cbm_data),
        };

        let edit = if cat.cdp_enabled {
            match (code, data) {
                (Some(code), Some(data)) => Some(CbmEdit::Cdp {
                    code: Bitmask::from_cbm(code, cat.cw_num)?,
                    data: Bitmask::from_cbm(data, cat.cw_num)?,
                }),
                _ => None,
            }
        } else {
            match shared {
                Some(cbm) => Some(CbmEdit::Shared(Bitmask::from_cbm(cbm, cat.cw_num)?)),
                None => None,
            }
        };

        if edit.is_none() {
            debug!("pool {} has no {:?} cbm to edit", pool.id, level);
        }
        Ok(edit)
    }

    /// Flip way `index` of the shared mask. With CDP this flips the code
    /// mask; use [`CbmEdit::toggle_data`] for the data mask.
    pub fn toggle(&mut self, index: usize) {
        match self {
            CbmEdit::Shared(mask) => mask.toggle(index),
            CbmEdit::Cdp { code, .. } => code.toggle(index),
        }
    }

    /// Flip way `index` of the data mask. Without CDP this is the shared
    /// mask.
    pub fn toggle_data(&mut self, index: usize) {
        match self {
            CbmEdit::Shared(mask) => mask.toggle(index),
            CbmEdit::Cdp { data, .. } => data.toggle(index),
        }
    }

    fn fields(&self, ways: usize) -> std::result::Result<CbmFields, CodecError> {
        Ok(match self {
            CbmEdit::Shared(mask) => CbmFields {
                shared: Some(mask.to_cbm_checked(ways)?),
                ..Default::default()
            },
            CbmEdit::Cdp { code, data } => CbmFields {
                shared: None,
                code: Some(code.to_cbm_checked(ways)?),
                data: Some(data.to_cbm_checked(ways)?),
            },
        })
    }
}

/// What the backend reported about the allocation features, needed to fill
/// in the defaults of a new pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocCaps {
    pub caps: Caps,
    pub l3cat: Option<CacheAllocation>,
    pub l2cat: Option<CacheAllocation>,
    pub mba_ctrl_enabled: bool,
}

impl AllocCaps {
    fn default_cbm(
        &self,
        cap: Capability,
        cat: &Option<CacheAllocation>,
    ) -> Result<Option<CbmFields>> {
        match cat {
            Some(cat) if self.caps.has(cap) && cat.cw_num > 0 => {
                Ok(Some(CbmFields::new(cat.cdp_enabled, full_cbm(cat.cw_num)?)))
            }
            _ => Ok(None),
        }
    }
}

/// Body of `POST /pools`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewPool {
    pub name: String,
    pub cores: RangeList,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l3cbm: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l3cbm_code: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l3cbm_data: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l2cbm: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l2cbm_code: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l2cbm_data: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mba: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mba_bw: Option<u64>,
}

impl NewPool {
    /// Build a new pool over `cores`. It gets every cache way at each
    /// supported cache level and no memory bandwidth throttling.
    pub fn build(name: &str, cores: &str, caps: &AllocCaps, config: &Config) -> Result<NewPool> {
        let res = validate_name(name, config.max_chars_name);
        if !res.is_valid() {
            bail!("Invalid pool name '{}': {}", name, res);
        }
        let cores = match parse_validated(cores, &Constraints::cores(config)) {
            Ok(cores) => cores,
            Err(res) => bail!("Invalid pool cores '{}': {}", cores, res),
        };

        let mut pool = NewPool {
            name: name.to_string(),
            cores,
            ..Default::default()
        };

        if caps.caps.has(Capability::Mba) {
            if caps.mba_ctrl_enabled {
                pool.mba_bw = Some(MBA_BW_UNLIMITED);
            } else {
                pool.mba = Some(MBA_DEFAULT_PERCENT);
            }
        }

        if let Some(l3) = caps.default_cbm(Capability::L3cat, &caps.l3cat)? {
            pool.l3cbm = l3.shared;
            pool.l3cbm_code = l3.code;
            pool.l3cbm_data = l3.data;
        }
        if let Some(l2) = caps.default_cbm(Capability::L2cat, &caps.l2cat)? {
            pool.l2cbm = l2.shared;
            pool.l2cbm_code = l2.code;
            pool.l2cbm_data = l2.data;
        }

        debug!("new pool {:?}", pool);
        Ok(pool)
    }
}

/// Body of `PUT /pools/{id}`. Only the fields that were set are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores: Option<RangeList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l3cbm: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l3cbm_code: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l3cbm_data: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l2cbm: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l2cbm_code: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l2cbm_data: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mba: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mba_bw: Option<u64>,
}

impl PoolUpdate {
    pub fn with_name(mut self, name: &str, config: &Config) -> Result<Self> {
        let res = validate_name(name, config.max_chars_name);
        if !res.is_valid() {
            bail!("Invalid pool name '{}': {}", name, res);
        }
        self.name = Some(name.to_string());
        Ok(self)
    }

    pub fn with_cores(mut self, cores: &str, config: &Config) -> Result<Self> {
        match parse_validated(cores, &Constraints::cores(config)) {
            Ok(cores) => self.cores = Some(cores),
            Err(res) => bail!("Invalid pool cores '{}': {}", cores, res),
        }
        Ok(self)
    }

    /// Set the CBM fields of `level` from `edit`, which must span `ways`
    /// cache ways.
    pub fn with_cbm(mut self, level: CacheLevel, edit: &CbmEdit, ways: usize) -> Result<Self> {
        let fields = edit.fields(ways)?;
        match level {
            CacheLevel::L3 => {
                self.l3cbm = fields.shared;
                self.l3cbm_code = fields.code;
                self.l3cbm_data = fields.data;
            }
            CacheLevel::L2 => {
                self.l2cbm = fields.shared;
                self.l2cbm_code = fields.code;
                self.l2cbm_data = fields.data;
            }
        }
        Ok(self)
    }

    pub fn with_mba(mut self, percent: u64) -> Result<Self> {
        let res = validate_mba_percent(percent);
        if !res.is_valid() {
            bail!("Invalid MBA percentage {}: {}", percent, res);
        }
        self.mba = Some(percent);
        Ok(self)
    }

    /// Limit memory bandwidth to `bw` MBps.
    pub fn with_mba_bw(mut self, bw: u64, config: &Config) -> Result<Self> {
        let res = validate_mba_bw(bw, config.mba_bw_max);
        if !res.is_valid() {
            bail!("Invalid MBA bandwidth {}: {}", bw, res);
        }
        self.mba_bw = Some(bw);
        Ok(self)
    }

    /// Lift the memory bandwidth limit.
    pub fn reset_mba_bw(mut self) -> Self {
        self.mba_bw = Some(MBA_BW_UNLIMITED);
        self
    }
}

/// Body of `POST /apps` and `PUT /apps/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewApp {
    pub name: String,
    pub pids: RangeList,
    pub pool_id: u64,
    pub cores: RangeList,
}

impl NewApp {
    /// Build an app running `pids` in pool `pool_id`. An empty `cores` pins
    /// the app to all the cores of its pool.
    pub fn build(
        name: &str,
        pids: &str,
        cores: &str,
        pool_id: u64,
        pools: &[Pool],
        config: &Config,
    ) -> Result<NewApp> {
        let res = validate_name(name, config.max_chars_name);
        if !res.is_valid() {
            bail!("Invalid app name '{}': {}", name, res);
        }
        let pids = match parse_validated(pids, &Constraints::pids(config)) {
            Ok(pids) => pids,
            Err(res) => bail!("Invalid app pids '{}': {}", pids, res),
        };

        let Some(pool) = pools.iter().find(|pool| pool.id == pool_id) else {
            bail!("Unknown pool {}", pool_id);
        };

        let cores = if cores.is_empty() {
            pool.cores.iter().copied().collect()
        } else {
            match parse_validated(cores, &Constraints::cores(config)) {
                Ok(cores) => cores,
                Err(res) => bail!("Invalid app cores '{}': {}", cores, res),
            }
        };

        Ok(NewApp {
            name: name.to_string(),
            pids,
            pool_id,
            cores,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l3cat(cdp: bool) -> CacheAllocation {
        CacheAllocation {
            cdp_enabled: cdp,
            cdp_supported: true,
            cw_num: 12,
            ..Default::default()
        }
    }

    fn alloc_caps(caps: &[&str]) -> AllocCaps {
        AllocCaps {
            caps: Caps {
                capabilities: caps.iter().map(|c| c.to_string()).collect(),
            },
            l3cat: Some(l3cat(false)),
            l2cat: Some(CacheAllocation {
                cw_num: 20,
                ..Default::default()
            }),
            mba_ctrl_enabled: false,
        }
    }

    #[test]
    fn test_new_pool_defaults() {
        let pool = NewPool::build(
            "hp",
            "0-3",
            &alloc_caps(&["l3cat", "l2cat", "mba"]),
            &Config::default(),
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(&pool).unwrap(),
            serde_json::json!({
                "name": "hp",
                "cores": [0, 1, 2, 3],
                "l3cbm": 4095,
                "l2cbm": 1048575,
                "mba": 100
            })
        );
    }

    #[test]
    fn test_new_pool_cdp_and_mba_ctrl() {
        let mut caps = alloc_caps(&["l3cat", "mba"]);
        caps.l3cat = Some(l3cat(true));
        caps.mba_ctrl_enabled = true;

        let pool = NewPool::build("db", "5", &caps, &Config::default()).unwrap();
        assert_eq!(pool.l3cbm, None);
        assert_eq!(pool.l3cbm_code, Some(4095));
        assert_eq!(pool.l3cbm_data, Some(4095));
        assert_eq!(pool.l2cbm, None);
        assert_eq!(pool.mba, None);
        assert_eq!(pool.mba_bw, Some(MBA_BW_UNLIMITED));
    }

    #[test]
    fn test_new_pool_rejects_input() {
        let caps = alloc_caps(&["l3cat"]);
        let config = Config::default();
        assert!(NewPool::build("", "0", &caps, &config).is_err());
        assert!(NewPool::build("hp", "", &caps, &config).is_err());
        assert!(NewPool::build("hp", "0-1025", &caps, &config).is_err());
        assert!(NewPool::build("hp", "0,a", &caps, &config).is_err());
    }

    #[test]
    fn test_cbm_edit_shared() {
        let pool = Pool {
            id: 2,
            l3cbm: Some(0xfff),
            ..Default::default()
        };
        let mut edit = CbmEdit::from_pool(&pool, CacheLevel::L3, &l3cat(false))
            .unwrap()
            .unwrap();
        edit.toggle(0);

        let body = PoolUpdate::default()
            .with_cbm(CacheLevel::L3, &edit, 12)
            .unwrap();
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({ "l3cbm": 2047 })
        );
    }

    #[test]
    fn test_cbm_edit_cdp() {
        let pool = Pool {
            id: 2,
            l3cbm_code: Some(0xfff),
            l3cbm_data: Some(0x0ff),
            ..Default::default()
        };
        let mut edit = CbmEdit::from_pool(&pool, CacheLevel::L3, &l3cat(true))
            .unwrap()
            .unwrap();
        edit.toggle(0);
        edit.toggle_data(0);

        let body = PoolUpdate::default()
            .with_cbm(CacheLevel::L3, &edit, 12)
            .unwrap();
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({ "l3cbm_code": 2047, "l3cbm_data": 2303 })
        );
    }

    #[test]
    fn test_cbm_edit_missing_or_invalid() {
        let pool = Pool {
            id: 2,
            l3cbm: Some(0xfff),
            ..Default::default()
        };
        assert_eq!(
            CbmEdit::from_pool(&pool, CacheLevel::L3, &l3cat(true)).unwrap(),
            None
        );
        assert_eq!(
            CbmEdit::from_pool(&pool, CacheLevel::L2, &l3cat(false)).unwrap(),
            None
        );

        let wide = Pool {
            id: 3,
            l3cbm: Some(0x1fff),
            ..Default::default()
        };
        assert!(CbmEdit::from_pool(&wide, CacheLevel::L3, &l3cat(false)).is_err());
    }

    #[test]
    fn test_cbm_width_mismatch() {
        let edit = CbmEdit::Shared(Bitmask::full(11).unwrap());
        assert!(PoolUpdate::default()
            .with_cbm(CacheLevel::L2, &edit, 12)
            .is_err());
    }

    #[test]
    fn test_pool_update_fields() {
        let config = Config::default();
        let body = PoolUpdate::default()
            .with_cores("11-8", &config)
            .unwrap()
            .with_mba(50)
            .unwrap();
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({ "cores": [8, 9, 10, 11], "mba": 50 })
        );

        assert!(PoolUpdate::default().with_mba(0).is_err());
        assert!(PoolUpdate::default().with_mba_bw(0, &config).is_err());
        assert_eq!(
            PoolUpdate::default().reset_mba_bw().mba_bw,
            Some(MBA_BW_UNLIMITED)
        );
        assert!(PoolUpdate::default().with_name("x".repeat(81).as_str(), &config).is_err());
    }

    #[test]
    fn test_new_app() {
        let pools = vec![Pool {
            id: 1,
            name: "hp".to_string(),
            cores: vec![2, 3],
            ..Default::default()
        }];
        let config = Config::default();

        let app = NewApp::build("db", "100-102", "", 1, &pools, &config).unwrap();
        assert_eq!(
            serde_json::to_value(&app).unwrap(),
            serde_json::json!({
                "name": "db",
                "pids": [100, 101, 102],
                "pool_id": 1,
                "cores": [2, 3]
            })
        );

        let app = NewApp::build("db", "7,5", "3", 1, &pools, &config).unwrap();
        assert_eq!(app.pids.to_vec(), vec![5, 7]);
        assert_eq!(app.cores.to_vec(), vec![3]);

        assert!(NewApp::build("db", "100", "", 9, &pools, &config).is_err());
        assert!(NewApp::build("db", "", "", 1, &pools, &config).is_err());
        assert!(NewApp::build("db", "1", "2000", 1, &pools, &config).is_err());
        assert!(NewApp::build("db", "0-18446744073709551615", "", 1, &pools, &config).is_err());
    }
}
