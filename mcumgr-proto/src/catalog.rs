//! SMP management groups, command ids and the payload schema of each
//! supported command.

use crate::codec::{self, Map, Value};
use crate::header::{Header, Op};
use crate::message::Message;
use crate::ProtocolError;

/// Management group ids
pub mod group {
    pub const OS: u16 = 0;
    pub const IMAGE: u16 = 1;
    pub const STAT: u16 = 2;
    pub const CONFIG: u16 = 3;
    pub const LOG: u16 = 4;
    pub const CRASH: u16 = 5;
    pub const SPLIT: u16 = 6;
    pub const RUN: u16 = 7;
    pub const FS: u16 = 8;
    pub const SHELL: u16 = 9;
}

/// Command ids in the OS group
pub mod os {
    pub const ECHO: u8 = 0;
    pub const CONSOLE_ECHO_CTRL: u8 = 1;
    pub const TASKSTAT: u8 = 2;
    pub const MPSTAT: u8 = 3;
    pub const DATETIME: u8 = 4;
    pub const RESET: u8 = 5;
}

/// Command ids in the IMAGE group
pub mod image {
    pub const STATE: u8 = 0;
    pub const UPLOAD: u8 = 1;
    pub const FILE: u8 = 2;
    pub const CORELIST: u8 = 3;
    pub const CORELOAD: u8 = 4;
    pub const ERASE: u8 = 5;
}

/// Name of an mcumgr return code, as carried in a response's `rc` field.
pub fn rc_name(rc: i64) -> &'static str {
    match rc {
        0 => "EOK",
        1 => "EUNKNOWN",
        2 => "ENOMEM",
        3 => "EINVAL",
        4 => "ETIMEOUT",
        5 => "ENOENT",
        6 => "EBADSTATE",
        7 => "EMSGSIZE",
        8 => "ENOTSUP",
        9 => "ECORRUPT",
        10 => "EBUSY",
        _ => "unknown error",
    }
}

/// Decoding of a response payload map.
pub trait FromMap: Sized {
    fn from_map(map: &Map) -> Result<Self, ProtocolError>;
}

/// Responses whose content is only worth showing, not interpreting.
impl FromMap for Map {
    fn from_map(map: &Map) -> Result<Self, ProtocolError> {
        Ok(map.clone())
    }
}

/// One entry of the command table.
pub trait Command {
    const OP: Op;
    const GROUP: u16;
    const ID: u8;

    type Response: FromMap;

    fn to_map(&self) -> Map;

    fn header(&self) -> Header {
        Header::new(Self::OP, Self::GROUP, Self::ID)
    }

    fn to_message(&self, seq: u8) -> Result<Message, ProtocolError> {
        let payload = codec::encode(&self.to_map())?;
        Message::new(self.header().with_seq(seq), payload)
    }
}

/// OS / RESET
#[derive(Debug, Clone, Default)]
pub struct Reset;

impl Command for Reset {
    const OP: Op = Op::Write;
    const GROUP: u16 = group::OS;
    const ID: u8 = os::RESET;

    type Response = Map;

    fn to_map(&self) -> Map {
        Map::new()
    }
}

/// OS / ECHO
#[derive(Debug, Clone)]
pub struct Echo {
    pub d: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoResponse {
    pub d: String,
}

impl Command for Echo {
    const OP: Op = Op::Write;
    const GROUP: u16 = group::OS;
    const ID: u8 = os::ECHO;

    type Response = EchoResponse;

    fn to_map(&self) -> Map {
        Map::from([("d".to_string(), Value::Text(self.d.clone()))])
    }
}

impl FromMap for EchoResponse {
    fn from_map(map: &Map) -> Result<Self, ProtocolError> {
        Ok(Self {
            d: codec::text(map, "d")?,
        })
    }
}

/// IMAGE / STATE read: list the image slots
#[derive(Debug, Clone, Default)]
pub struct ImageList;

impl Command for ImageList {
    const OP: Op = Op::Read;
    const GROUP: u16 = group::IMAGE;
    const ID: u8 = image::STATE;

    type Response = ImageState;

    fn to_map(&self) -> Map {
        Map::new()
    }
}

/// IMAGE / STATE write: mark an image for test boot, or confirm it
#[derive(Debug, Clone)]
pub struct ImageSetState {
    pub hash: Vec<u8>,
    pub confirm: bool,
}

impl ImageSetState {
    pub fn test(hash: Vec<u8>) -> Self {
        Self {
            hash,
            confirm: false,
        }
    }

    pub fn confirm(hash: Vec<u8>) -> Self {
        Self {
            hash,
            confirm: true,
        }
    }
}

impl Command for ImageSetState {
    const OP: Op = Op::Write;
    const GROUP: u16 = group::IMAGE;
    const ID: u8 = image::STATE;

    type Response = ImageState;

    fn to_map(&self) -> Map {
        Map::from([
            ("hash".to_string(), Value::Bytes(self.hash.clone())),
            ("confirm".to_string(), Value::Bool(self.confirm)),
        ])
    }
}

/// One slot of an [`ImageState`] response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSlot {
    pub image: Option<i64>,
    pub slot: i64,
    pub version: String,
    pub hash: Vec<u8>,
    pub bootable: bool,
    pub pending: bool,
    pub confirmed: bool,
    pub active: bool,
    pub permanent: bool,
}

impl ImageSlot {
    /// Names of the flags that are set, in display order
    pub fn flags(&self) -> Vec<&'static str> {
        [
            ("bootable", self.bootable),
            ("pending", self.pending),
            ("confirmed", self.confirmed),
            ("active", self.active),
            ("permanent", self.permanent),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }
}

impl FromMap for ImageSlot {
    fn from_map(map: &Map) -> Result<Self, ProtocolError> {
        Ok(Self {
            image: codec::optional_int(map, "image")?,
            slot: codec::int(map, "slot")?,
            version: codec::text(map, "version")?,
            hash: codec::bytes(map, "hash")?,
            bootable: codec::flag(map, "bootable")?,
            pending: codec::flag(map, "pending")?,
            confirmed: codec::flag(map, "confirmed")?,
            active: codec::flag(map, "active")?,
            permanent: codec::flag(map, "permanent")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageState {
    pub images: Vec<ImageSlot>,
    pub split_status: Option<i64>,
}

impl FromMap for ImageState {
    fn from_map(map: &Map) -> Result<Self, ProtocolError> {
        let images = match map.get("images") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| ImageSlot::from_map(&codec::as_map(item, "images")?))
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(ProtocolError::InvalidField("images")),
            None => return Err(ProtocolError::MissingField("images")),
        };

        Ok(Self {
            images,
            split_status: codec::optional_int(map, "splitStatus")?,
        })
    }
}

/// IMAGE / UPLOAD: one chunk of a firmware image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub data: Vec<u8>,
    pub off: u64,
    /// Total image length
    pub len: u64,
    pub sha: [u8; 32],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResponse {
    /// Offset the device expects next
    pub off: Option<i64>,
}

/// Worst-case encoded size of an [`ImageUpload`] payload, not counting the
/// chunk bytes themselves.
pub const UPLOAD_ENCODING_OVERHEAD: usize = 1 // map(4)
    + 5 + 3 // "data", bstr header up to 65535 bytes
    + 4 + 5 // "off", uint32
    + 4 + 5 // "len", uint32
    + 4 + 2 + 32; // "sha", bstr(32)

impl Command for ImageUpload {
    const OP: Op = Op::Write;
    const GROUP: u16 = group::IMAGE;
    const ID: u8 = image::UPLOAD;

    type Response = UploadResponse;

    fn to_map(&self) -> Map {
        Map::from([
            ("data".to_string(), Value::Bytes(self.data.clone())),
            ("off".to_string(), Value::Integer(self.off.into())),
            ("len".to_string(), Value::Integer(self.len.into())),
            ("sha".to_string(), Value::Bytes(self.sha.to_vec())),
        ])
    }
}

impl FromMap for UploadResponse {
    fn from_map(map: &Map) -> Result<Self, ProtocolError> {
        Ok(Self {
            off: codec::optional_int(map, "off")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::HEADER_LEN;

    #[test]
    fn echo_request() {
        let message = Echo { d: "hi".into() }.to_message(7).unwrap();
        assert_eq!(message.header.op, Op::Write);
        assert_eq!(message.header.group, group::OS);
        assert_eq!(message.header.id, os::ECHO);
        assert_eq!(message.header.seq, 7);
        assert_eq!(message.header.length as usize, message.payload.len());

        let map = codec::decode(&message.payload).unwrap();
        assert_eq!(codec::text(&map, "d").unwrap(), "hi");
    }

    #[test]
    fn list_is_a_read_and_test_confirm_are_writes_of_the_same_command() {
        let list = ImageList.header();
        let test = ImageSetState::test(vec![0xab; 32]).header();
        let confirm = ImageSetState::confirm(vec![0xab; 32]).header();

        assert_eq!(list.op, Op::Read);
        assert_eq!(test.op, Op::Write);
        assert_eq!((list.group, list.id), (group::IMAGE, image::STATE));
        assert_eq!((test.group, test.id), (list.group, list.id));
        assert_eq!((confirm.group, confirm.id), (list.group, list.id));

        assert!(codec::decode(&ImageList.to_message(0).unwrap().payload)
            .unwrap()
            .is_empty());

        let map = ImageSetState::confirm(vec![1, 2]).to_map();
        assert_eq!(map.get("confirm"), Some(&Value::Bool(true)));
        assert_eq!(map.get("hash"), Some(&Value::Bytes(vec![1, 2])));
        assert_eq!(
            ImageSetState::test(vec![1, 2]).to_map().get("confirm"),
            Some(&Value::Bool(false))
        );
    }

    #[test]
    fn image_state_response() {
        let slot = |n: i64, active: bool| {
            Value::Map(vec![
                (Value::Text("slot".into()), Value::Integer(n.into())),
                (Value::Text("version".into()), Value::Text("1.2.3".into())),
                (Value::Text("hash".into()), Value::Bytes(vec![n as u8; 32])),
                (Value::Text("bootable".into()), Value::Bool(true)),
                (Value::Text("active".into()), Value::Bool(active)),
                (Value::Text("confirmed".into()), Value::Bool(active)),
            ])
        };
        let map = Map::from([
            (
                "images".to_string(),
                Value::Array(vec![slot(0, true), slot(1, false)]),
            ),
            ("splitStatus".to_string(), Value::Integer(0.into())),
        ]);

        let state = ImageState::from_map(&codec::decode(&codec::encode(&map).unwrap()).unwrap())
            .unwrap();
        assert_eq!(state.split_status, Some(0));
        assert_eq!(state.images.len(), 2);
        assert_eq!(state.images[0].flags(), vec!["bootable", "confirmed", "active"]);
        assert_eq!(state.images[1].flags(), vec!["bootable"]);
        assert_eq!(state.images[1].hash, vec![1; 32]);
        assert!(!state.images[1].pending);
    }

    #[test]
    fn image_state_without_images_is_an_error() {
        assert_eq!(
            ImageState::from_map(&Map::new()),
            Err(ProtocolError::MissingField("images"))
        );
    }

    #[test]
    fn upload_overhead_covers_a_full_request() {
        let request = ImageUpload {
            data: vec![0xee; 1000],
            off: u32::MAX as u64,
            len: u32::MAX as u64,
            sha: [0x11; 32],
        };
        let message = request.to_message(0).unwrap();
        assert!(message.payload.len() <= request.data.len() + UPLOAD_ENCODING_OVERHEAD);
        assert_eq!(message.to_bytes().len(), HEADER_LEN + message.payload.len());
    }

    #[test]
    fn rc_names() {
        assert_eq!(rc_name(0), "EOK");
        assert_eq!(rc_name(8), "ENOTSUP");
        assert_eq!(rc_name(99), "unknown error");
    }
}
