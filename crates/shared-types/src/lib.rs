use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

mod envelope;

pub use envelope::{Envelope, ResponseResult};

/// Marker in a doctor's time-range label meaning first-visit slots are gone
pub const FIRST_VISIT_FULL_MARKER: &str = "初诊:已满";

/// What a run is watching, selected from a `_`-delimited resource code.
///
/// Three segments name a department (`1001_1_1207`), four name a single
/// doctor within it (`1001_1_1207_1322`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorTarget {
    Department(String),
    Doctor(String),
}

impl MonitorTarget {
    pub fn parse(code: &str) -> Option<Self> {
        if code.is_empty() {
            return None;
        }

        match code.split('_').count() {
            3 => Some(MonitorTarget::Department(code.to_string())),
            4 => Some(MonitorTarget::Doctor(code.to_string())),
            _ => None,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            MonitorTarget::Department(code) | MonitorTarget::Doctor(code) => code,
        }
    }

    pub fn kind_label(&self) -> &str {
        match self {
            MonitorTarget::Department(_) => "department",
            MonitorTarget::Doctor(_) => "doctor",
        }
    }
}

fn is_flag_set(flag: &str) -> bool {
    flag == "1"
}

/// Upstream sends `null` for blank fields and empty lists
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// Catalog (YuYue/OrderDeptResources)

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HospitalEntry {
    #[serde(rename = "hospitalID")]
    pub hospital_id: Option<String>,
    pub hospital_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeptEntry {
    pub dept_code: Option<String>,
    pub dept_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorEntry {
    pub doc_code: Option<String>,
    pub doc_name: Option<String>,
}

/// Code catalog listing hospitals, departments and doctors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeptCatalog {
    #[serde(default, deserialize_with = "null_as_default")]
    pub hospital_list: Vec<HospitalEntry>,
    #[serde(default, rename = "deptLevel1List", deserialize_with = "null_as_default")]
    pub dept_level1_list: Vec<DeptEntry>,
    #[serde(default, rename = "deptLevel2List", deserialize_with = "null_as_default")]
    pub dept_level2_list: Vec<DeptEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dept_resource_doc_list: Vec<DoctorEntry>,

    /// Fields this crate does not read, kept so the cached copy stays whole
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeptCatalog {
    pub fn is_empty(&self) -> bool {
        self.hospital_list.is_empty()
            && self.dept_level1_list.is_empty()
            && self.dept_level2_list.is_empty()
            && self.dept_resource_doc_list.is_empty()
    }

    /// Every (code, name) pair the catalog carries, hospitals first.
    pub fn named_codes(&self) -> Vec<(&str, &str)> {
        let hospitals = self
            .hospital_list
            .iter()
            .map(|h| (h.hospital_id.as_deref(), h.hospital_name.as_deref()));
        let depts = self
            .dept_level1_list
            .iter()
            .chain(self.dept_level2_list.iter())
            .map(|d| (d.dept_code.as_deref(), d.dept_name.as_deref()));
        let doctors = self
            .dept_resource_doc_list
            .iter()
            .map(|d| (d.doc_code.as_deref(), d.doc_name.as_deref()));

        hospitals
            .chain(depts)
            .chain(doctors)
            .filter_map(|pair| match pair {
                (Some(code), Some(name)) if !code.is_empty() && !name.is_empty() => {
                    Some((code, name))
                }
                _ => None,
            })
            .collect()
    }
}

// Department schedule (YuYue/OrderDocResources)

/// One doctor-day entry in a department schedule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeptSlot {
    #[serde(default, deserialize_with = "null_as_default")]
    pub doc_code: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub day: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub resource_memo: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_available: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeptSlot {
    pub fn available(&self) -> bool {
        is_flag_set(&self.is_available)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeptSchedule {
    #[serde(default, deserialize_with = "null_as_default")]
    pub dept_resource_doc_no_source_list: Vec<DeptSlot>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeptSchedule {
    pub fn available_slots(&self) -> impl Iterator<Item = &DeptSlot> {
        self.dept_resource_doc_no_source_list
            .iter()
            .filter(|slot| slot.available())
    }
}

// Doctor schedule (YuYue/OrderDocNoSources)

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorDay {
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_day: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_available: String,
}

impl DoctorDay {
    /// The doctor works that day and it still has open slots.
    pub fn bookable(&self) -> bool {
        is_flag_set(&self.is_day) && is_flag_set(&self.is_available)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorResource {
    #[serde(default, deserialize_with = "null_as_default")]
    pub resource_memo: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub time_end: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_available: String,
}

impl DoctorResource {
    pub fn available(&self) -> bool {
        is_flag_set(&self.is_available)
    }
}

/// Response of the doctor endpoint. Without a `day` in the request only
/// the day list is filled; with one, only the resource list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorSchedule {
    #[serde(default, deserialize_with = "null_as_default")]
    pub doc_resource_day_list: Vec<DoctorDay>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub doc_resource_resource_list: Vec<DoctorResource>,
}

/// An open slot for one doctor on one day, as stored and compared.
///
/// Field order is the serialized order; comparisons rely on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableSlot {
    pub name: String,
    pub date: String,
    pub memo: String,
    pub time: String,
    pub haji: bool,
}

impl AvailableSlot {
    pub fn from_resource(name: &str, date: &str, resource: &DoctorResource) -> Self {
        Self {
            name: name.to_string(),
            date: date.to_string(),
            memo: resource.resource_memo.clone(),
            time: resource.time_end.clone(),
            haji: !resource.time_end.contains(FIRST_VISIT_FULL_MARKER),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_from_segment_count() {
        assert_eq!(
            MonitorTarget::parse("1001_1_1207"),
            Some(MonitorTarget::Department("1001_1_1207".to_string()))
        );
        assert_eq!(
            MonitorTarget::parse("1001_1_1207_1322"),
            Some(MonitorTarget::Doctor("1001_1_1207_1322".to_string()))
        );
        assert_eq!(MonitorTarget::parse("1001_1"), None);
        assert_eq!(MonitorTarget::parse("1_2_3_4_5"), None);
        assert_eq!(MonitorTarget::parse(""), None);
    }

    #[test]
    fn test_haji_from_time_label() {
        let full = DoctorResource {
            resource_memo: "专家号".to_string(),
            time_end: "08:00-09:00 初诊:已满".to_string(),
            is_available: "1".to_string(),
        };
        let open = DoctorResource {
            time_end: "09:00-10:00 初诊:2".to_string(),
            ..full.clone()
        };

        assert!(!AvailableSlot::from_resource("李冠军", "2025-04-01", &full).haji);
        assert!(AvailableSlot::from_resource("李冠军", "2025-04-01", &open).haji);
    }

    #[test]
    fn test_available_slot_serialized_field_order() {
        let slot = AvailableSlot {
            name: "金金".to_string(),
            date: "2025-04-02".to_string(),
            memo: "下午".to_string(),
            time: "14:00".to_string(),
            haji: true,
        };
        assert_eq!(
            serde_json::to_string(&slot).unwrap(),
            r#"{"name":"金金","date":"2025-04-02","memo":"下午","time":"14:00","haji":true}"#
        );
    }

    #[test]
    fn test_catalog_named_codes_skip_incomplete_entries() {
        let body = r#"{
            "hospitalList": [{"hospitalID": "1001", "hospitalName": "市精神卫生中心"}],
            "deptLevel1List": [{"deptCode": "1001_1", "deptName": null}],
            "deptLevel2List": [{"deptCode": "1001_1_1207", "deptName": "成人ADHD咨询"}],
            "deptResourceDocList": [{"docCode": "1001_1_1207_633"}],
            "other": 3
        }"#;
        let catalog: DeptCatalog = serde_json::from_str(body).unwrap();

        assert_eq!(
            catalog.named_codes(),
            vec![("1001", "市精神卫生中心"), ("1001_1_1207", "成人ADHD咨询")]
        );
        assert_eq!(catalog.extra.get("other"), Some(&Value::from(3)));
    }

    #[test]
    fn test_null_text_fields_read_as_empty() {
        let body = r#"{"deptResourceDocNoSourceList":[{"docCode":"a","day":"2025-04-01","resourceMemo":null,"isAvailable":"1"}]}"#;
        let schedule: DeptSchedule = serde_json::from_str(body).unwrap();
        let slot = &schedule.dept_resource_doc_no_source_list[0];
        assert_eq!(slot.resource_memo, "");
        assert!(slot.available());

        let body = r#"{"docResourceResourceList":[{"resourceMemo":"专家号","timeEnd":null,"isAvailable":"1"}]}"#;
        let schedule: DoctorSchedule = serde_json::from_str(body).unwrap();
        let slot = AvailableSlot::from_resource("金金", "2025-04-01", &schedule.doc_resource_resource_list[0]);
        assert_eq!(slot.time, "");
        assert!(slot.haji);

        let schedule: DeptSchedule =
            serde_json::from_str(r#"{"deptResourceDocNoSourceList":null}"#).unwrap();
        assert_eq!(schedule.available_slots().count(), 0);
    }

    #[test]
    fn test_unknown_slot_fields_survive_roundtrip() {
        let body = r#"{"deptResourceDocNoSourceList":[{"docCode":"a","day":"d","resourceMemo":"m","isAvailable":"0","docName":"x"}]}"#;
        let schedule: DeptSchedule = serde_json::from_str(body).unwrap();
        let json = serde_json::to_value(&schedule).unwrap();

        assert_eq!(json["deptResourceDocNoSourceList"][0]["docName"], "x");
        assert_eq!(schedule.available_slots().count(), 0);
    }
}
