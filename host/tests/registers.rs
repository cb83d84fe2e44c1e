use edaqs::{
    frame::NodeId,
    registers::avr64ea28::{self, PgaGain, RefVoltage},
    registers::{pico2_bu79100g, pico2_ads131m04},
    trigger::{Trigger, TriggerMode, Slope},
    host::*,
    sim::*,
    };


fn avr() -> (SimulatedNode, Avr64ea28<SimulatedBus>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let node = SimulatedNode::new(NodeId::new('2').unwrap(), Profile::Avr64ea28);
    let bus = SimulatedBus::new().with_node(node.clone());
    (node, Avr64ea28::new(Gateway::new(bus, NodeId::new('2').unwrap())))
}

fn pico() -> (SimulatedNode, Pico2Bu79100g<SimulatedBus>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let node = SimulatedNode::new(NodeId::new('P').unwrap(), Profile::Pico2Bu79100g)
        .with_confirmation(Confirmation::Echo);
    let bus = SimulatedBus::new().with_node(node.clone());
    let gateway = Gateway::new(bus, NodeId::new('P').unwrap())
        .with_confirmation(Confirmation::Echo);
    (node, Pico2Bu79100g::new(gateway))
}

fn ads() -> (SimulatedNode, Pico2Ads131m04<SimulatedBus>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let node = SimulatedNode::new(NodeId::new('C').unwrap(), Profile::Pico2Ads131m04);
    let bus = SimulatedBus::new().with_node(node.clone());
    (node, Pico2Ads131m04::new(Gateway::new(bus, NodeId::new('C').unwrap())))
}


#[tokio::test]
async fn get_set() {
    let (node, mut daq) = avr();
    assert!(daq.version().await.unwrap().starts_with("AVR64EA28"));
    assert_eq!(daq.register_count().await.unwrap(), 36);
    daq.check_table().await.unwrap();

    assert_eq!(daq.get(0).await.unwrap(), 250);
    assert_eq!(daq.set(0, 125).await.unwrap(), 125);
    assert_eq!(daq.get(0).await.unwrap(), 125);
    assert_eq!(node.register(0), Some(125));
    assert_eq!(daq.sample_period_us().await.unwrap(), 100.);

    assert_eq!(daq.write(avr64ea28::TRIG_LEVEL, -300).await.unwrap(), -300);
    assert_eq!(daq.read(avr64ea28::TRIG_LEVEL).await.unwrap(), -300);

    daq.factory_reset().await.unwrap();
    assert_eq!(daq.get(0).await.unwrap(), 250);
}

#[tokio::test]
async fn range_fault() {
    let (node, mut daq) = avr();
    assert!(matches!(daq.get(36).await, Err(Error::Range {index: 36, count: 36})));

    // older firmware without burst nor differential conversion
    node.set_register_count(34);
    assert!(matches!(daq.set(34, 2).await, Err(Error::Range {index: 34, count: 34})));
    assert_eq!(node.register(34), Some(0));
    assert!(matches!(daq.check_table().await, Err(Error::TableMismatch {device: 34, table: 36})));
    assert!(matches!(daq.dump_as_text().await, Err(Error::TableMismatch {..})));
    assert_eq!(daq.get(33).await.unwrap(), 48);
}

#[tokio::test]
async fn by_label() {
    let (node, mut daq) = avr();
    daq.set_from_map(&[("NCHANNELS", 3), ("NSAMPLES", 500), ("CH2+", 5)]).await.unwrap();
    assert_eq!(node.register(1), Some(3));
    assert_eq!(node.register(2), Some(500));
    assert_eq!(node.register(14), Some(5));

    daq.set_many(&[(7, 1), (8, 2)]).await.unwrap();
    assert_eq!(daq.analog_gain().await.unwrap(), 4.);

    assert!(matches!(daq.set_from_map(&[("NCHANNELS", 2), ("PERIOD", 10)]).await,
        Err(Error::UnknownRegister(ref label)) if label == "PERIOD"));
    // the labels before the unknown one are applied
    assert_eq!(node.register(1), Some(2));
}

#[tokio::test]
async fn dump() {
    let (_node, mut daq) = avr();
    let text = daq.dump_as_text().await.unwrap();
    let lines = text.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 37);
    assert_eq!(lines[0], "Reg  Val  Label");
    assert_eq!(lines[1], "0 250 PER_TICKS");
    assert_eq!(lines[10], "9 3 V_REF");
    assert_eq!(lines[36], "35 0 DIFF_CONV");

    let (_node, mut daq) = pico();
    let text = daq.dump_as_text().await.unwrap();
    assert_eq!(text, "Reg  Val  Label\n0 10 PERIOD_US\n1 8 NCHANNELS\n2 128 NSAMPLES\n3 0 TRIG_MODE\n4 0 RTDP_US\n");
}

#[tokio::test]
async fn avr_settings() {
    let (node, mut daq) = avr();
    daq.set_analog_channels(&[("AIN0", "gnd"), ("PC3", "AIN1"), ("29", "PD7")]).await.unwrap();
    assert_eq!(node.register(1), Some(3));
    let inputs = (10 .. 16).map(|i| node.register(i).unwrap()).collect::<Vec<_>>();
    assert_eq!(inputs, [0, 48, 31, 1, 29, 7]);
    assert!(matches!(daq.set_analog_channels(&[("AIN0", "PB2")]).await, Err(Error::Parse {..})));
    assert_eq!(node.register(1), Some(3));

    assert_eq!(daq.analog_gain().await.unwrap(), 1.);
    daq.set_pga(PgaGain::X16).await.unwrap();
    assert_eq!(daq.analog_gain().await.unwrap(), 16.);
    daq.clear_pga().await.unwrap();
    assert_eq!(daq.analog_gain().await.unwrap(), 1.);

    assert_eq!(daq.ref_voltage().await.unwrap(), 4.096);
    daq.set_ref_voltage(RefVoltage::Vdd).await.unwrap();
    assert_eq!(daq.ref_voltage().await.unwrap(), 4.75);

    daq.set_burst(64).await.unwrap();
    assert_eq!(node.register(34), Some(6));
    assert_eq!(daq.burst().await.unwrap(), 64);
    assert!(matches!(daq.set_burst(48).await, Err(Error::Unsupported(_))));
    assert!(matches!(daq.set_burst(2048).await, Err(Error::Unsupported(_))));

    daq.set_differential_conversion().await.unwrap();
    assert_eq!(node.register(35), Some(1));
    daq.set_single_sided_conversion().await.unwrap();
    assert_eq!(node.register(35), Some(0));

    assert_eq!(daq.set_sample_period_us(50.).await.unwrap(), 49.6);
    assert_eq!(node.register(0), Some(62));
}

#[tokio::test]
async fn triggers() {
    let (node, mut daq) = avr();
    daq.set_trigger(Trigger::Internal {channel: 1, level: 1200, slope: Slope::Falling}).await.unwrap();
    assert_eq!(daq.trigger_mode().await.unwrap(), TriggerMode::Internal);
    assert_eq!((4 .. 7).map(|i| node.register(i).unwrap()).collect::<Vec<_>>(), [1, 1200, 0]);
    daq.set_trigger(Trigger::External).await.unwrap();
    assert_eq!(node.register(3), Some(2));
    assert!(matches!(daq.set_trigger(Trigger::WaitForEventLine).await, Err(Error::Unsupported(_))));
    assert_eq!(daq.trigger_mode().await.unwrap(), TriggerMode::External);

    assert_eq!(daq.set_post_trigger_samples(40_000).await.unwrap(), 32767);
    assert_eq!(daq.set_post_trigger_samples(300).await.unwrap(), 300);
    assert_eq!(daq.post_trigger_samples().await.unwrap(), 300);

    let (node, mut daq) = pico();
    daq.set_trigger(Trigger::WaitForEventLine).await.unwrap();
    assert_eq!(node.register(pico2_bu79100g::TRIG_MODE.index()), Some(1));
    for trigger in [Trigger::External, Trigger::Internal {channel: 0, level: 0, slope: Slope::Rising}] {
        assert!(matches!(daq.set_trigger(trigger).await, Err(Error::Unsupported(_))));
    }
    assert_eq!(daq.set_post_trigger_samples(40_000).await.unwrap(), 32768);
}

#[tokio::test]
async fn pico_settings() {
    let (node, mut daq) = pico();
    assert!(daq.version().await.unwrap().starts_with("PICO2_BU79100G"));
    assert_eq!(daq.register_count().await.unwrap(), 5);
    assert_eq!(daq.sample_period_us().await.unwrap(), 10.);
    assert_eq!(daq.set_rtdp_timeout_us(20).await.unwrap(), 20);
    assert_eq!(node.register(4), Some(20));

    node.set_millivolts(3250);
    assert_eq!(daq.analog_millivolts().await.unwrap(), 3250);
    assert_eq!(daq.ref_voltage().await.unwrap(), 3.25);
    assert_eq!(daq.analog_gain().await.unwrap(), 1.);
}

#[tokio::test]
async fn gateway_controls() {
    let (node, daq) = avr();
    let mut gateway = daq.into_gateway();
    assert_eq!(gateway.version().await.unwrap(), GATEWAY_VERSION);

    gateway.set_led(true).await.unwrap();
    assert!(node.led());
    gateway.set_led(false).await.unwrap();
    assert!(! node.led());

    gateway.set_vref_on(100).await.unwrap();
    assert_eq!(node.vref(), Some(100));
    gateway.set_vref_off().await.unwrap();
    assert_eq!(node.vref(), None);

    gateway.enable_internal_trigger(128, Slope::Rising).await.unwrap();
    assert!(node.armed());
    gateway.disable_trigger().await.unwrap();
    assert!(! node.armed());

    node.set_comparator_met(true);
    assert!(matches!(gateway.enable_external_trigger(10, Slope::Falling).await, Err(Error::Device {..})));
    assert!(! node.armed());

    gateway.flush_daq_input().await.unwrap();
    let status = gateway.status().await.unwrap();
    assert!(status.ready());
    assert!(! status.event_passed());
    assert!(matches!(gateway.command("y").await, Err(Error::Device {..})));
}

#[tokio::test]
async fn ads131m04_settings() {
    let (node, mut daq) = ads();
    assert_eq!(daq.gateway().confirmation(), Confirmation::Echo);
    assert!(daq.version().await.unwrap().starts_with("PICO2_ADS131M04"));
    daq.check_table().await.unwrap();

    // 8192 kHz clock, oversampling by 1024
    assert_eq!(daq.sample_period_us().await.unwrap(), 250.);
    assert_eq!(daq.set_sample_period_us(100.).await.unwrap(), 62.5);
    assert_eq!(daq.oversampling_ratio().await.unwrap(), 256);
    assert_eq!(daq.set_clock_khz(4096).await.unwrap(), 4096);
    assert_eq!(daq.sample_period_us().await.unwrap(), 125.);
    assert!(matches!(daq.set_oversampling_ratio(300).await, Err(Error::Unsupported(_))));
    daq.set_oversampling_ratio(1024).await.unwrap();
    assert_eq!(node.register(pico2_ads131m04::OSR.index()), Some(1024));

    assert_eq!(daq.analog_gain().await.unwrap(), 1.);
    daq.set_gain(8).await.unwrap();
    assert_eq!(node.register(pico2_ads131m04::PGA_GAIN.index()), Some(3));
    assert_eq!(daq.analog_gain().await.unwrap(), 8.);
    assert!(matches!(daq.set_gain(256).await, Err(Error::Unsupported(_))));
    assert!(matches!(daq.set_gain(3).await, Err(Error::Unsupported(_))));
    assert_eq!(daq.ref_voltage().await.unwrap(), 1.2);

    daq.set_led(true).await.unwrap();
    assert!(node.daq_led());
    daq.set_led(false).await.unwrap();
    assert!(! node.daq_led());

    assert_eq!(daq.error_flags().await.unwrap(), 0);
    assert!(! daq.late().await.unwrap());
    node.set_late(true);
    assert!(daq.late().await.unwrap());

    let volts = daq.immediate_volts().await.unwrap();
    assert_eq!(volts.len(), 4);
    for (channel, &volts) in volts.iter().enumerate() {
        assert_eq!(volts, pico2_ads131m04::volts(pattern(0, channel), 8.));
    }

    daq.set_trigger(Trigger::External).await.unwrap();
    assert_eq!(daq.trigger_mode().await.unwrap(), TriggerMode::External);
    assert!(matches!(daq.set_trigger(Trigger::Internal {channel: 0, level: 0, slope: Slope::Rising}).await,
        Err(Error::Unsupported(_))));

    daq.factory_reset().await.unwrap();
    assert_eq!(node.register(pico2_ads131m04::CLK_KHZ.index()), Some(8192));
    assert_eq!(node.register(pico2_ads131m04::PGA_GAIN.index()), Some(0));
}

#[tokio::test]
async fn stale_input_discarded() {
    let id = NodeId::new('2').unwrap();
    let mut bus = SimulatedBus::new().with_node(SimulatedNode::new(id, Profile::Avr64ea28));
    // a late response and some noise left on the bus
    bus.inject("/0v STALE#\n");
    bus.inject("garbage");
    let mut gateway = Gateway::new(&mut bus, id);
    assert_eq!(gateway.version().await.unwrap(), GATEWAY_VERSION);
    assert!(gateway.is_ready().await.unwrap());
}
