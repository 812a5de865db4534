//! Endpoint wrappers over the classified entry points.
//!
//! Each wrapper supplies a fixed path and an ordered field list; all XML
//! handling stays in the engine.  This is a representative slice of the
//! WebUI API, not the full catalogue.

use chrono::Local;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::xml::{Fields, XmlMap};

/// Maximum SMS content length accepted by the send endpoint.
pub const SMS_MAX_LEN: usize = 160;

/// The inbox types available on a HiLink device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsBoxType {
    Inbox = 1,
    Outbox = 2,
    Draft = 3,
}

/// Operation selector for the SIM PIN endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinType {
    Enter = 0,
    Activate = 1,
    Deactivate = 2,
    Change = 3,
    EnterPuk = 4,
}

/// USSD session states reported by `api/ussd/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UssdState {
    None = 0,
    Active = 1,
    Waiting = 2,
}

fn bool_flag(b: bool) -> &'static str {
    if b { "1" } else { "0" }
}

impl Client {
    // -- device ------------------------------------------------------------

    /// Device information (model, IMEI, versions).
    pub async fn device_info(&self) -> Result<XmlMap> {
        self.data("api/device/information", None).await
    }

    /// Basic device information.
    pub async fn device_basic_info(&self) -> Result<XmlMap> {
        self.data("api/device/basic_information", None).await
    }

    /// Autorun version string.
    pub async fn autorun_version(&self) -> Result<String> {
        self.text("api/device/autorun-version", None, "Version").await
    }

    /// Restart the device.
    pub async fn reboot(&self) -> Result<bool> {
        let body = Fields::new().field("Control", "1");
        self.check_ok("api/device/control", Some(body.into())).await
    }

    // -- monitoring / network ----------------------------------------------

    /// Connection status information.
    pub async fn status_info(&self) -> Result<XmlMap> {
        self.data("api/monitoring/status", None).await
    }

    /// Traffic statistics.
    pub async fn traffic_statistics(&self) -> Result<XmlMap> {
        self.data("api/monitoring/traffic-statistics", None).await
    }

    /// Pending notification information.
    pub async fn notification_info(&self) -> Result<XmlMap> {
        self.data("api/monitoring/check-notifications", None).await
    }

    /// Current network provider information.
    pub async fn network_info(&self) -> Result<XmlMap> {
        self.data("api/net/current-plmn", None).await
    }

    /// Dial up the network connection.
    pub async fn connect(&self) -> Result<bool> {
        let body = Fields::new().field("Action", "1");
        self.check_ok("api/dialup/dial", Some(body.into())).await
    }

    /// Tear down the network connection.
    pub async fn disconnect(&self) -> Result<bool> {
        let body = Fields::new().field("Action", "0");
        self.check_ok("api/dialup/dial", Some(body.into())).await
    }

    // -- SMS ---------------------------------------------------------------

    /// Per-inbox SMS counts.
    pub async fn sms_count(&self) -> Result<XmlMap> {
        self.data("api/sms/sms-count", None).await
    }

    /// List SMS from an inbox.  Field order is load-bearing here.
    pub async fn sms_list(
        &self,
        box_type: SmsBoxType,
        page: u32,
        count: u32,
        ascending: bool,
        unread_preferred: bool,
    ) -> Result<XmlMap> {
        let body = Fields::new()
            .field("PageIndex", page.to_string())
            .field("ReadCount", count.to_string())
            .field("BoxType", (box_type as u32).to_string())
            .field("SortType", "0")
            .field("Ascending", bool_flag(ascending))
            .field("UnreadPreferred", bool_flag(unread_preferred));
        self.data("api/sms/sms-list", Some(body.into())).await
    }

    /// Send an SMS to one or more recipients.
    ///
    /// Content of 160 characters or more fails with
    /// [`Error::MessageTooLong`] before any request is dispatched.
    pub async fn sms_send(&self, msg: &str, to: &[&str]) -> Result<bool> {
        if msg.len() >= SMS_MAX_LEN {
            return Err(Error::MessageTooLong);
        }

        let mut phones = Fields::new();
        for recipient in to {
            phones.push("Phone", *recipient);
        }

        // Field order is load-bearing here.
        let body = Fields::new()
            .field("Index", "-1")
            .nested("Phones", phones)
            .field("Sca", "")
            .field("Content", msg)
            .field("Length", msg.len().to_string())
            .field("Reserved", "1")
            .field("Date", Local::now().format("%Y-%m-%d %H:%M:%S").to_string());
        self.check_ok("api/sms/send-sms", Some(body.into())).await
    }

    /// SMS send status information.
    pub async fn sms_send_status(&self) -> Result<XmlMap> {
        self.data("api/sms/send-status", None).await
    }

    /// Mark an SMS as read.
    pub async fn sms_set_read(&self, id: &str) -> Result<bool> {
        let body = Fields::new().field("Index", id);
        self.check_ok("api/sms/set-read", Some(body.into())).await
    }

    /// Delete an SMS.
    pub async fn sms_delete(&self, id: &str) -> Result<bool> {
        let body = Fields::new().field("Index", id);
        self.check_ok("api/sms/delete-sms", Some(body.into())).await
    }

    // -- SIM PIN -----------------------------------------------------------

    async fn pin_operate(&self, op: PinType, current: &str, new: &str, puk: &str) -> Result<bool> {
        let body = Fields::new()
            .field("OperateType", (op as u32).to_string())
            .field("CurrentPin", current)
            .field("NewPin", new)
            .field("PukCode", puk);
        self.check_ok("api/pin/operate", Some(body.into())).await
    }

    /// SIM PIN status information.
    pub async fn pin_info(&self) -> Result<XmlMap> {
        self.data("api/pin/status", None).await
    }

    /// Enter the SIM PIN.
    pub async fn pin_enter(&self, pin: &str) -> Result<bool> {
        self.pin_operate(PinType::Enter, pin, "", "").await
    }

    /// Enable the SIM PIN requirement.
    pub async fn pin_activate(&self, pin: &str) -> Result<bool> {
        self.pin_operate(PinType::Activate, pin, "", "").await
    }

    /// Disable the SIM PIN requirement.
    pub async fn pin_deactivate(&self, pin: &str) -> Result<bool> {
        self.pin_operate(PinType::Deactivate, pin, "", "").await
    }

    /// Change the SIM PIN.
    pub async fn pin_change(&self, pin: &str, new: &str) -> Result<bool> {
        self.pin_operate(PinType::Change, pin, new, "").await
    }

    /// Unlock the SIM with a PUK code and set a new PIN.
    pub async fn pin_enter_puk(&self, puk: &str, new: &str) -> Result<bool> {
        self.pin_operate(PinType::EnterPuk, new, new, puk).await
    }

    // -- USSD --------------------------------------------------------------

    /// Whether the device is currently engaged in a USSD session.
    pub async fn ussd_status(&self) -> Result<UssdState> {
        let s = self.text("api/ussd/status", None, "result").await?;
        match s.as_str() {
            "0" => Ok(UssdState::None),
            "1" => Ok(UssdState::Active),
            "2" => Ok(UssdState::Waiting),
            _ => Err(Error::InvalidResponse("unknown ussd state")),
        }
    }

    /// Send a USSD code.
    pub async fn ussd_code(&self, code: &str) -> Result<bool> {
        let body = Fields::new()
            .field("content", code)
            .field("codeType", "CodeType")
            .field("timeout", "");
        self.check_ok("api/ussd/send", Some(body.into())).await
    }

    /// Content buffer of the active USSD session.
    pub async fn ussd_content(&self) -> Result<String> {
        self.text("api/ussd/get", None, "content").await
    }

    /// Release the active USSD session.
    pub async fn ussd_release(&self) -> Result<bool> {
        self.check_ok("api/ussd/release", None).await
    }
}
