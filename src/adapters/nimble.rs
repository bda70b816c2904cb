//! NimBLE central adapter: implements [`RadioPort`] on the ESP-IDF
//! NimBLE host.
//!
//! The host stack is brought up through `esp32_nimble::BLEDevice`; scanning,
//! connections and GATT client procedures go through the raw NimBLE C API
//! so that every asynchronous result lands in one of two places:
//!
//! - GAP callbacks (advertisements, connect/disconnect, notifications) push
//!   into [`RADIO_EVENTS`] and return.  They never call back into NimBLE.
//! - GATT procedure callbacks push into a private channel that the blocking
//!   call on the main task waits on, with a timeout.
//!
//! ```text
//!  NimBLE host task                         main task
//!  ────────────────                         ─────────
//!  gap_scan_event ──▶ RADIO_EVENTS ──▶ TrackerService::tick
//!  gap_link_event ──▶ RADIO_EVENTS
//!  gatt_*_done   ──▶ GATT_RESULTS ──▶ NimbleRadio::{service,read,...}
//! ```

use core::cell::RefCell;
use core::ffi::c_void;
use core::sync::atomic::{AtomicI32, AtomicU16, Ordering};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_svc::sys as nimble;
use log::{debug, info, warn};

use crate::adapters::time::uptime_ms;
use crate::app::ports::{
    CharHandle, DescriptorStep, LinkHandle, NotifyHandle, RadioPort, READ_CAP, ScanMode,
    ServiceHandle,
};
use crate::config::{MAX_TAGS, ScanParams, TagAddress};
use crate::error::RadioError;
use crate::events::{NOTIFY_PAYLOAD_CAP, RADIO_EVENTS, RadioEvent};

/// Upper bound for one GATT client procedure (discovery, read, write).
pub const GATT_TIMEOUT_MS: u32 = 5_000;

/// Battery discovery and read, button discovery, CCCD lookup and write, per tag.
pub const GATT_BUDGET_PER_TAG_MS: u32 = 7 * GATT_TIMEOUT_MS;

const NO_CONN: u16 = 0xFFFF;
const CONNECT_PENDING: i32 = i32::MIN;
const BLE_HS_EALREADY: i32 = 2;
const BLE_HS_ETIMEOUT: i32 = 13;
const BLE_HS_EDONE: u16 = 14;
const BLE_ERR_REM_USER_CONN_TERM: u8 = 0x13;
const CCCD_ENABLE_NOTIFY: [u8; 2] = [0x01, 0x00];
const POLL_MS: u32 = 5;

// ── Shared state written by NimBLE callbacks ──────────────────

/// Connection handle per link, `NO_CONN` while down.
static CONN_HANDLES: [AtomicU16; MAX_TAGS] = [const { AtomicU16::new(NO_CONN) }; MAX_TAGS];

/// Outcome of the last connect per link (`CONNECT_PENDING` while in flight).
static CONNECT_RC: [AtomicI32; MAX_TAGS] = [const { AtomicI32::new(CONNECT_PENDING) }; MAX_TAGS];

/// Addresses whose advertisements are forwarded; everything else is ignored
/// inside the scan callback.
static KNOWN_TAGS: Mutex<CriticalSectionRawMutex, RefCell<heapless::Vec<TagAddress, MAX_TAGS>>> =
    Mutex::new(RefCell::new(heapless::Vec::new()));

#[derive(Debug, Clone)]
enum GattResult {
    Service(ServiceHandle),
    Characteristic(CharHandle),
    Value(heapless::Vec<u8, READ_CAP>),
    Descriptor(u16),
    Written,
    Done,
    Failed(u16),
}

static GATT_RESULTS: Channel<CriticalSectionRawMutex, GattResult, 8> = Channel::new();

// ───────────────────────────────────────────────────────────────
// Adapter
// ───────────────────────────────────────────────────────────────

pub struct NimbleRadio {
    own_addr_type: u8,
    scan: ScanParams,
    links: heapless::Vec<TagAddress, MAX_TAGS>,
}

impl NimbleRadio {
    /// Bring up the NimBLE host and wait for it to sync with the controller.
    pub fn new(scan: ScanParams) -> Result<Self, RadioError> {
        let _device = esp32_nimble::BLEDevice::take();

        let deadline = uptime_ms().wrapping_add(GATT_TIMEOUT_MS);
        // SAFETY: ble_hs_synced only reads host state.
        while unsafe { nimble::ble_hs_synced() } == 0 {
            if deadline.wrapping_sub(uptime_ms()) > GATT_TIMEOUT_MS {
                return Err(RadioError::LinkUnavailable);
            }
            FreeRtos::delay_ms(10);
        }

        let mut own_addr_type: u8 = 0;
        // SAFETY: out-pointer is a valid local.
        let rc = unsafe { nimble::ble_hs_id_infer_auto(0, &mut own_addr_type) };
        if rc != 0 {
            return Err(RadioError::Stack(rc));
        }

        info!("NimBLE host ready (own addr type {})", own_addr_type);
        Ok(Self {
            own_addr_type,
            scan,
            links: heapless::Vec::new(),
        })
    }

    fn conn_handle(&self, link: LinkHandle) -> Option<u16> {
        let h = CONN_HANDLES.get(link.0 as usize)?.load(Ordering::Acquire);
        (h != NO_CONN).then_some(h)
    }

    fn require_conn(&self, link: LinkHandle) -> Result<u16, RadioError> {
        self.conn_handle(link).ok_or(RadioError::LinkUnavailable)
    }

    /// Wait for the next GATT procedure result, or `None` on timeout.
    fn await_gatt(&self, deadline: u32) -> Option<GattResult> {
        loop {
            if let Ok(result) = GATT_RESULTS.try_receive() {
                return Some(result);
            }
            if uptime_ms().wrapping_sub(deadline) < u32::MAX / 2 {
                return None;
            }
            FreeRtos::delay_ms(POLL_MS);
        }
    }

    fn reset_gatt(&self) {
        while GATT_RESULTS.try_receive().is_ok() {}
    }

    /// Walk the descriptors after a characteristic value looking for its
    /// CCCD.  `None` when the peer lists none or discovery fails.
    fn find_cccd(&self, conn: u16, characteristic: &CharHandle) -> Option<u16> {
        if characteristic.value == u16::MAX {
            return None;
        }
        self.reset_gatt();

        // SAFETY: plain handles, no borrowed memory.
        let rc = unsafe {
            nimble::ble_gattc_disc_all_dscs(
                conn,
                characteristic.value,
                u16::MAX,
                Some(gatt_descriptor_found),
                core::ptr::null_mut(),
            )
        };
        if rc != 0 {
            debug!("Descriptor discovery rc={}", rc);
            return None;
        }

        let deadline = uptime_ms().wrapping_add(GATT_TIMEOUT_MS);
        while let Some(result) = self.await_gatt(deadline) {
            match result {
                GattResult::Descriptor(handle) => return Some(handle),
                GattResult::Done => return None,
                GattResult::Failed(status) => {
                    debug!("Descriptor discovery status {}", status);
                    return None;
                }
                _ => {}
            }
        }
        None
    }
}

impl RadioPort for NimbleRadio {
    fn create_link(&mut self, address: TagAddress) -> Result<LinkHandle, RadioError> {
        let index = self.links.len();
        self.links.push(address).map_err(|_| RadioError::LinkUnavailable)?;
        KNOWN_TAGS.lock(|known| {
            let _ = known.borrow_mut().push(address);
        });
        CONN_HANDLES[index].store(NO_CONN, Ordering::Release);
        Ok(LinkHandle(index as u8))
    }

    fn start_scan(&mut self, mode: ScanMode) -> Result<(), RadioError> {
        // SAFETY: zeroed is a valid bit pattern for this plain C struct.
        let mut params: nimble::ble_gap_disc_params = unsafe { core::mem::zeroed() };
        params.itvl = self.scan.interval_units();
        params.window = self.scan.window_units();
        params.filter_policy = 0;
        params.set_limited(0);
        params.set_passive(u8::from(!self.scan.active));
        params.set_filter_duplicates(1);

        let duration_ms = match mode {
            ScanMode::Continuous => i32::MAX,
            ScanMode::Duration { ms } => ms.min(i32::MAX as u32) as i32,
        };

        // SAFETY: params outlives the call; the callback takes no argument.
        let rc = unsafe {
            nimble::ble_gap_disc(
                self.own_addr_type,
                duration_ms,
                &params,
                Some(gap_scan_event),
                core::ptr::null_mut(),
            )
        };
        match rc {
            0 => Ok(()),
            BLE_HS_EALREADY => Ok(()),
            rc => {
                warn!("ble_gap_disc rc={}", rc);
                Err(RadioError::ScanFailed)
            }
        }
    }

    fn stop_scan(&mut self) -> Result<(), RadioError> {
        // SAFETY: no arguments; safe to call with no scan running.
        let rc = unsafe { nimble::ble_gap_disc_cancel() };
        match rc {
            0 | BLE_HS_EALREADY => Ok(()),
            rc => Err(RadioError::Stack(rc)),
        }
    }

    fn clear_scan_results(&mut self) {
        // Nothing is cached host-side; the controller's duplicate filter
        // is reset when discovery restarts.
    }

    fn is_scanning(&self) -> bool {
        // SAFETY: reads host state only.
        unsafe { nimble::ble_gap_disc_active() != 0 }
    }

    fn connect(
        &mut self,
        link: LinkHandle,
        address: TagAddress,
        timeout_ms: u32,
    ) -> Result<(), RadioError> {
        let index = link.0 as usize;
        if index >= self.links.len() {
            return Err(RadioError::LinkUnavailable);
        }
        if self.conn_handle(link).is_some() {
            return Ok(());
        }

        // The controller cannot initiate while discovering.
        self.stop_scan()?;

        let peer = nimble::ble_addr_t {
            type_: nimble::BLE_ADDR_PUBLIC as u8,
            val: address.to_le_bytes(),
        };
        CONNECT_RC[index].store(CONNECT_PENDING, Ordering::Release);

        // SAFETY: peer outlives the call; default connection parameters;
        // the callback argument is the link index, not a pointer.
        let rc = unsafe {
            nimble::ble_gap_connect(
                self.own_addr_type,
                &peer,
                timeout_ms.min(i32::MAX as u32) as i32,
                core::ptr::null(),
                Some(gap_link_event),
                index as *mut c_void,
            )
        };
        if rc != 0 {
            return Err(RadioError::Stack(rc));
        }

        // NimBLE reports its own timeout; the extra margin only guards
        // against a callback that never comes.
        let deadline = uptime_ms().wrapping_add(timeout_ms.saturating_add(1_000));
        loop {
            match CONNECT_RC[index].load(Ordering::Acquire) {
                CONNECT_PENDING => {}
                0 => return Ok(()),
                BLE_HS_ETIMEOUT => return Err(RadioError::ConnectTimeout),
                rc => {
                    debug!("connect status {}", rc);
                    return Err(RadioError::ConnectFailed);
                }
            }
            if uptime_ms().wrapping_sub(deadline) < u32::MAX / 2 {
                // SAFETY: cancels the pending connect, if any.
                unsafe { nimble::ble_gap_conn_cancel() };
                return Err(RadioError::ConnectTimeout);
            }
            FreeRtos::delay_ms(POLL_MS);
        }
    }

    fn is_connected(&self, link: LinkHandle) -> bool {
        self.conn_handle(link).is_some()
    }

    fn disconnect(&mut self, link: LinkHandle) -> Result<(), RadioError> {
        let conn = self.require_conn(link)?;
        // SAFETY: conn is a handle NimBLE gave us.
        let rc = unsafe { nimble::ble_gap_terminate(conn, BLE_ERR_REM_USER_CONN_TERM) };
        match rc {
            0 | BLE_HS_EALREADY => Ok(()),
            rc => Err(RadioError::Stack(rc)),
        }
    }

    fn service(&mut self, link: LinkHandle, uuid: u16) -> Option<ServiceHandle> {
        let conn = self.conn_handle(link)?;
        let uuid = uuid16(uuid);
        self.reset_gatt();

        // SAFETY: uuid outlives the call (NimBLE copies it).
        let rc = unsafe {
            nimble::ble_gattc_disc_svc_by_uuid(
                conn,
                &uuid.u,
                Some(gatt_service_found),
                core::ptr::null_mut(),
            )
        };
        if rc != 0 {
            warn!("Service discovery rc={}", rc);
            return None;
        }

        let deadline = uptime_ms().wrapping_add(GATT_TIMEOUT_MS);
        let mut found = None;
        while let Some(result) = self.await_gatt(deadline) {
            match result {
                GattResult::Service(svc) => found = found.or(Some(svc)),
                GattResult::Done => break,
                GattResult::Failed(status) => {
                    debug!("Service discovery status {}", status);
                    break;
                }
                _ => {}
            }
        }
        found
    }

    fn characteristic(
        &mut self,
        link: LinkHandle,
        service: &ServiceHandle,
        uuid: u16,
    ) -> Option<CharHandle> {
        let conn = self.conn_handle(link)?;
        let uuid = uuid16(uuid);
        self.reset_gatt();

        // SAFETY: uuid outlives the call (NimBLE copies it).
        let rc = unsafe {
            nimble::ble_gattc_disc_chrs_by_uuid(
                conn,
                service.start,
                service.end,
                &uuid.u,
                Some(gatt_characteristic_found),
                core::ptr::null_mut(),
            )
        };
        if rc != 0 {
            warn!("Characteristic discovery rc={}", rc);
            return None;
        }

        let deadline = uptime_ms().wrapping_add(GATT_TIMEOUT_MS);
        let mut found = None;
        while let Some(result) = self.await_gatt(deadline) {
            match result {
                GattResult::Characteristic(chr) => found = found.or(Some(chr)),
                GattResult::Done | GattResult::Failed(_) => break,
                _ => {}
            }
        }
        found
    }

    fn read(
        &mut self,
        link: LinkHandle,
        characteristic: &CharHandle,
    ) -> Result<heapless::Vec<u8, READ_CAP>, RadioError> {
        let conn = self.require_conn(link)?;
        self.reset_gatt();

        // SAFETY: plain handles, no borrowed memory.
        let rc = unsafe {
            nimble::ble_gattc_read(
                conn,
                characteristic.value,
                Some(gatt_read_done),
                core::ptr::null_mut(),
            )
        };
        if rc != 0 {
            return Err(RadioError::Stack(rc));
        }

        match self.await_gatt(uptime_ms().wrapping_add(GATT_TIMEOUT_MS)) {
            Some(GattResult::Value(bytes)) => Ok(bytes),
            _ => Err(RadioError::ReadFailed),
        }
    }

    fn subscribe(
        &mut self,
        link: LinkHandle,
        characteristic: &CharHandle,
    ) -> Result<NotifyHandle, RadioError> {
        let conn = self.require_conn(link)?;
        let cccd = self
            .find_cccd(conn, characteristic)
            .unwrap_or_else(|| characteristic.assumed_cccd());
        debug!("CCCD for value handle {} is {}", characteristic.value, cccd);
        self.reset_gatt();

        // SAFETY: NimBLE copies the flat buffer before returning.
        let rc = unsafe {
            nimble::ble_gattc_write_flat(
                conn,
                cccd,
                CCCD_ENABLE_NOTIFY.as_ptr().cast(),
                CCCD_ENABLE_NOTIFY.len() as u16,
                Some(gatt_write_done),
                core::ptr::null_mut(),
            )
        };
        if rc != 0 {
            return Err(RadioError::SubscribeFailed);
        }

        match self.await_gatt(uptime_ms().wrapping_add(GATT_TIMEOUT_MS)) {
            Some(GattResult::Written) => {}
            // Some iTags notify without a writable CCCD.
            Some(GattResult::Failed(status)) => {
                warn!("CCCD write status {}, continuing", status);
            }
            _ => return Err(RadioError::SubscribeFailed),
        }

        Ok(NotifyHandle {
            link,
            attr: characteristic.value,
        })
    }
}

fn uuid16(value: u16) -> nimble::ble_uuid16_t {
    nimble::ble_uuid16_t {
        u: nimble::ble_uuid_t {
            type_: nimble::BLE_UUID_TYPE_16 as u8,
        },
        value,
    }
}

// ───────────────────────────────────────────────────────────────
// NimBLE callbacks (host task context)
// ───────────────────────────────────────────────────────────────

extern "C" fn gap_scan_event(event: *mut nimble::ble_gap_event, _arg: *mut c_void) -> i32 {
    if event.is_null() {
        return 0;
    }
    // SAFETY: NimBLE passes a valid event for the duration of the call.
    let event = unsafe { &*event };

    match event.type_ as u32 {
        nimble::BLE_GAP_EVENT_DISC => {
            // SAFETY: `disc` is the active union member for DISC events.
            let disc = unsafe { &event.__bindgen_anon_1.disc };
            let address = TagAddress::from_le_bytes(disc.addr.val);
            let known = KNOWN_TAGS.lock(|known| known.borrow().contains(&address));
            if known {
                RADIO_EVENTS.push(RadioEvent::Advertisement(address));
            }
        }
        nimble::BLE_GAP_EVENT_DISC_COMPLETE => {
            RADIO_EVENTS.push(RadioEvent::ScanEnded);
        }
        _ => {}
    }
    0
}

extern "C" fn gap_link_event(event: *mut nimble::ble_gap_event, arg: *mut c_void) -> i32 {
    if event.is_null() {
        return 0;
    }
    let index = arg as usize;
    if index >= MAX_TAGS {
        return 0;
    }
    let link = LinkHandle(index as u8);
    // SAFETY: NimBLE passes a valid event for the duration of the call.
    let event = unsafe { &*event };

    match event.type_ as u32 {
        nimble::BLE_GAP_EVENT_CONNECT => {
            // SAFETY: `connect` is the active union member.
            let connect = unsafe { &event.__bindgen_anon_1.connect };
            if connect.status == 0 {
                CONN_HANDLES[index].store(connect.conn_handle, Ordering::Release);
                RADIO_EVENTS.push(RadioEvent::Connected(link));
            }
            CONNECT_RC[index].store(connect.status, Ordering::Release);
        }
        nimble::BLE_GAP_EVENT_DISCONNECT => {
            CONN_HANDLES[index].store(NO_CONN, Ordering::Release);
            RADIO_EVENTS.push(RadioEvent::Disconnected(link));
        }
        nimble::BLE_GAP_EVENT_NOTIFY_RX => {
            // SAFETY: `notify_rx` is the active union member.
            let rx = unsafe { &event.__bindgen_anon_1.notify_rx };
            let mut payload = heapless::Vec::<u8, NOTIFY_PAYLOAD_CAP>::new();
            if !rx.om.is_null() {
                // SAFETY: om is a valid mbuf for the duration of the call.
                let om = unsafe { &*rx.om };
                let len = (om.om_len as usize).min(NOTIFY_PAYLOAD_CAP);
                // SAFETY: om_data points at om_len readable bytes.
                let data = unsafe { core::slice::from_raw_parts(om.om_data, len) };
                let _ = payload.extend_from_slice(data);
            }
            RADIO_EVENTS.push(RadioEvent::Notification {
                handle: NotifyHandle {
                    link,
                    attr: rx.attr_handle,
                },
                payload,
                at_ms: uptime_ms(),
            });
        }
        _ => {}
    }
    0
}

fn gatt_status(error: *const nimble::ble_gatt_error) -> u16 {
    if error.is_null() {
        return 0;
    }
    // SAFETY: non-null error pointers are valid for the callback.
    unsafe { (*error).status }
}

extern "C" fn gatt_service_found(
    _conn: u16,
    error: *const nimble::ble_gatt_error,
    service: *const nimble::ble_gatt_svc,
    _arg: *mut c_void,
) -> i32 {
    let result = match gatt_status(error) {
        0 if !service.is_null() => {
            // SAFETY: checked non-null above.
            let svc = unsafe { &*service };
            GattResult::Service(ServiceHandle {
                start: svc.start_handle,
                end: svc.end_handle,
            })
        }
        0 | BLE_HS_EDONE => GattResult::Done,
        status => GattResult::Failed(status),
    };
    let _ = GATT_RESULTS.try_send(result);
    0
}

extern "C" fn gatt_characteristic_found(
    _conn: u16,
    error: *const nimble::ble_gatt_error,
    chr: *const nimble::ble_gatt_chr,
    _arg: *mut c_void,
) -> i32 {
    let result = match gatt_status(error) {
        0 if !chr.is_null() => {
            // SAFETY: checked non-null above.
            let chr = unsafe { &*chr };
            GattResult::Characteristic(CharHandle {
                value: chr.val_handle,
                properties: chr.properties,
            })
        }
        0 | BLE_HS_EDONE => GattResult::Done,
        status => GattResult::Failed(status),
    };
    let _ = GATT_RESULTS.try_send(result);
    0
}

/// Reports the first CCCD and stops the procedure there, or at the first
/// declaration, so the result channel never floods.
extern "C" fn gatt_descriptor_found(
    _conn: u16,
    error: *const nimble::ble_gatt_error,
    _chr_val_handle: u16,
    dsc: *const nimble::ble_gatt_dsc,
    _arg: *mut c_void,
) -> i32 {
    let (result, stop) = match gatt_status(error) {
        0 if !dsc.is_null() => {
            // SAFETY: checked non-null above; the union tag selects the field.
            let (handle, uuid) = unsafe {
                let dsc = &*dsc;
                let uuid = if dsc.uuid.u.type_ == nimble::BLE_UUID_TYPE_16 as u8 {
                    Some(dsc.uuid.u16_.value)
                } else {
                    None
                };
                (dsc.handle, uuid)
            };
            match uuid.map(DescriptorStep::classify) {
                Some(DescriptorStep::Cccd) => (Some(GattResult::Descriptor(handle)), true),
                Some(DescriptorStep::End) => (Some(GattResult::Done), true),
                Some(DescriptorStep::Skip) | None => (None, false),
            }
        }
        0 | BLE_HS_EDONE => (Some(GattResult::Done), false),
        status => (Some(GattResult::Failed(status)), false),
    };
    if let Some(result) = result {
        let _ = GATT_RESULTS.try_send(result);
    }
    // Non-zero ends the procedure without a further callback.
    i32::from(stop)
}

extern "C" fn gatt_read_done(
    _conn: u16,
    error: *const nimble::ble_gatt_error,
    attr: *mut nimble::ble_gatt_attr,
    _arg: *mut c_void,
) -> i32 {
    let result = match gatt_status(error) {
        0 if !attr.is_null() => {
            // SAFETY: checked non-null; om is valid for the callback.
            let om = unsafe { (*attr).om };
            let mut value = heapless::Vec::new();
            if !om.is_null() {
                // SAFETY: om_data points at om_len readable bytes.
                let om = unsafe { &*om };
                let len = (om.om_len as usize).min(READ_CAP);
                let data = unsafe { core::slice::from_raw_parts(om.om_data, len) };
                let _ = value.extend_from_slice(data);
            }
            GattResult::Value(value)
        }
        status => GattResult::Failed(status),
    };
    let _ = GATT_RESULTS.try_send(result);
    0
}

extern "C" fn gatt_write_done(
    _conn: u16,
    error: *const nimble::ble_gatt_error,
    _attr: *mut nimble::ble_gatt_attr,
    _arg: *mut c_void,
) -> i32 {
    let result = match gatt_status(error) {
        0 => GattResult::Written,
        status => GattResult::Failed(status),
    };
    let _ = GATT_RESULTS.try_send(result);
    0
}
