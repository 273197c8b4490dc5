//! Fixed capabilities advertised to the debugger.

/// Target description served for `qXfer:features:read`.
pub const TARGET_XML: &str = r#"<?xml version="1.0"?>
<!DOCTYPE target SYSTEM "gdb-target.dtd">
<target>
<feature name="org.gnu.gdb.m68k.core">
  <reg name="d0" bitsize="32"/>
  <reg name="d1" bitsize="32"/>
  <reg name="d2" bitsize="32"/>
  <reg name="d3" bitsize="32"/>
  <reg name="d4" bitsize="32"/>
  <reg name="d5" bitsize="32"/>
  <reg name="d6" bitsize="32"/>
  <reg name="d7" bitsize="32"/>
  <reg name="a0" bitsize="32" type="data_ptr"/>
  <reg name="a1" bitsize="32" type="data_ptr"/>
  <reg name="a2" bitsize="32" type="data_ptr"/>
  <reg name="a3" bitsize="32" type="data_ptr"/>
  <reg name="a4" bitsize="32" type="data_ptr"/>
  <reg name="a5" bitsize="32" type="data_ptr"/>
  <reg name="fp" bitsize="32" type="data_ptr"/>
  <reg name="sp" bitsize="32" type="data_ptr"/>

  <reg name="ps" bitsize="16"/>
  <reg name="pc" bitsize="32" type="code_ptr"/>
</feature>
</target>"#;

/// Reply to `qSupported`.
pub const SUPPORTED: &str = "PacketSize=4096;qXfer:features:read+;hwbreak+";

/// Signal number reported for every halt (SIGTRAP).
pub const STOP_SIGNAL: u8 = 5;

/// Reply to `qXfer:features:read:…`: the whole document in one chunk,
/// marked as the last one.
pub fn features_reply() -> String {
    format!("l{TARGET_XML}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_advertises_fixed_feature_set() {
        let features: Vec<&str> = SUPPORTED.split(';').collect();
        assert_eq!(
            features,
            ["PacketSize=4096", "qXfer:features:read+", "hwbreak+"]
        );
    }

    #[test]
    fn features_reply_is_single_last_chunk() {
        let reply = features_reply();
        assert!(reply.starts_with("l<?xml"));
        assert_eq!(&reply[1..], TARGET_XML);
    }

    #[test]
    fn target_xml_declares_eighteen_registers() {
        assert_eq!(TARGET_XML.matches("<reg ").count(), 18);
        assert!(TARGET_XML.contains(r#"<reg name="ps" bitsize="16"/>"#));
        assert!(TARGET_XML.ends_with("</target>"));
    }
}
