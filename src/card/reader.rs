use std::ffi::CString;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pcsc::{Context, Protocols, Scope, ShareMode};

use super::{CardChannel, CardError, CardResult};

/// A card connected through a PC/SC reader.
///
/// The connection is opened in exclusive mode so that no other process can
/// interleave commands while a delivery runs.
pub struct PcscChannel {
    card: Arc<Mutex<pcsc::Card>>,
    reader: String,
}

impl PcscChannel {
    /// Connects to the card in the reader whose name contains `filter`
    /// (case-insensitive). Without a filter exactly one reader must be present.
    pub fn connect(filter: Option<&str>) -> CardResult<Self> {
        let ctx = Context::establish(Scope::User)
            .map_err(|e| CardError::Unreachable(format!("No PC/SC context: {e}")))?;
        let readers = ctx
            .list_readers_owned()
            .map_err(|e| CardError::Unreachable(format!("Failed to list readers: {e}")))?;

        let reader = select_reader(&readers, filter)?;
        let name = reader.to_string_lossy().into_owned();

        let card = ctx
            .connect(reader, ShareMode::Exclusive, Protocols::ANY)
            .map_err(|e| match e {
                pcsc::Error::NoSmartcard | pcsc::Error::RemovedCard => CardError::Removed,
                e => CardError::Unreachable(format!("Failed to connect to {name}: {e}")),
            })?;

        tracing::info!("Using card in {name}");
        Ok(Self {
            card: Arc::new(Mutex::new(card)),
            reader: name,
        })
    }

    pub fn reader(&self) -> &str {
        &self.reader
    }
}

fn select_reader<'a>(readers: &'a [CString], filter: Option<&str>) -> CardResult<&'a CString> {
    match filter {
        Some(filter) => {
            let filter = filter.to_lowercase();
            readers
                .iter()
                .find(|r| r.to_string_lossy().to_lowercase().contains(&filter))
                .ok_or_else(|| CardError::Unreachable(format!("Reader \"{filter}\" not found")))
        }
        None => match readers {
            [single] => Ok(single),
            [] => Err(CardError::Unreachable("No smart card readers".into())),
            _ => Err(CardError::Unreachable(
                "Several readers present, select one with card.reader".into(),
            )),
        },
    }
}

#[async_trait]
impl CardChannel for PcscChannel {
    async fn transmit(&mut self, command: &[u8]) -> CardResult<Vec<u8>> {
        let card = Arc::clone(&self.card);
        let command = command.to_vec();

        // SCardTransmit blocks the calling thread until the card answers
        tokio::task::spawn_blocking(move || {
            let card = card
                .lock()
                .map_err(|_| CardError::TransmissionFailed("card lock poisoned".into()))?;
            let mut buffer = [0u8; pcsc::MAX_BUFFER_SIZE_EXTENDED];
            card.transmit(&command, &mut buffer)
                .map(<[u8]>::to_vec)
                .map_err(|e| match e {
                    pcsc::Error::RemovedCard | pcsc::Error::NoSmartcard => CardError::Removed,
                    e => CardError::TransmissionFailed(e.to_string()),
                })
        })
        .await
        .map_err(|e| CardError::TransmissionFailed(format!("transmit task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn readers(names: &[&str]) -> Vec<CString> {
        names.iter().map(|n| CString::new(*n).unwrap()).collect()
    }

    #[test]
    fn test_select_reader_by_filter() {
        let readers = readers(&["ACS ACR122U 00 00", "Yubico YubiKey OTP+FIDO+CCID 01 00"]);
        let reader = select_reader(&readers, Some("yubikey")).unwrap();
        assert_eq!(reader.to_str().unwrap(), "Yubico YubiKey OTP+FIDO+CCID 01 00");
        assert!(select_reader(&readers, Some("omnikey")).is_err());
    }

    #[test]
    fn test_select_reader_requires_single_reader_without_filter() {
        assert!(select_reader(&readers(&[]), None).is_err());
        assert!(select_reader(&readers(&["a", "b"]), None).is_err());
        assert_eq!(
            select_reader(&readers(&["only"]), None).unwrap().to_str().unwrap(),
            "only"
        );
    }
}
